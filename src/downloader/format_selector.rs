// FormatSelector - maps an output kind to yt-dlp and ffmpeg arguments
//
// Two halves:
// - download side: the `-f` selector and merge container handed to yt-dlp
// - conversion side: the ffmpeg argument vector for one downloaded file
//
// Everything here is decided from the job request and the input path alone.

use std::path::{Path, PathBuf};

use super::models::{AudioCodec, ClipWindow, ConversionSpec, OutputKind, Resolution};

/// Selector for the clip job's full source video
pub const CLIP_SOURCE_SELECTOR: &str = "bestvideo+bestaudio/best";

/// Container the clip job's source is merged into
pub const CLIP_SOURCE_CONTAINER: &str = "mp4";

/// Temporary source file of a clip job, relative to the output directory
pub const CLIP_TEMP_NAME: &str = "temp_video.mp4";

/// Final clip file, relative to the output directory
pub const CLIP_OUTPUT_NAME: &str = "output.gif";

/// Appended to the stem when the source already has the target extension
const CONVERTED_SUFFIX: &str = "_converted";

const VIDEO_CRF: &str = "23";
const VIDEO_PRESET: &str = "slow";
const VIDEO_AUDIO_BITRATE: &str = "192k";

const CLIP_FILTER_GRAPH: &str =
    "fps=10,scale=640:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

pub struct FormatSelector;

impl FormatSelector {
    /// yt-dlp `-f` value for a standard job
    pub fn download_selector(kind: &OutputKind) -> String {
        match kind {
            OutputKind::Video { resolution: Resolution::Height(h) } => {
                format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]", h = h)
            }
            OutputKind::Video { resolution: Resolution::Auto } => "bestvideo+bestaudio/best".to_string(),
            // audio gets pulled out of whatever container arrives
            OutputKind::Audio(_) | OutputKind::Clip(_) => "bestaudio/best".to_string(),
        }
    }

    /// `--merge-output-format` value, if any
    pub fn merge_container(kind: &OutputKind) -> Option<&'static str> {
        match kind {
            OutputKind::Video { .. } => Some("mp4"),
            OutputKind::Audio(_) | OutputKind::Clip(_) => None,
        }
    }

    /// Full ffmpeg invocation converting `input` into `kind`
    pub fn conversion_spec(kind: &OutputKind, input: &Path) -> ConversionSpec {
        let output = match kind {
            OutputKind::Clip(_) => input
                .parent()
                .map(|dir| dir.join(CLIP_OUTPUT_NAME))
                .unwrap_or_else(|| PathBuf::from(CLIP_OUTPUT_NAME)),
            _ => Self::output_path(input, kind.extension()),
        };

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        match kind {
            OutputKind::Audio(codec) => args.extend(Self::audio_args(*codec)),
            OutputKind::Video { resolution } => args.extend(Self::video_args(*resolution)),
            OutputKind::Clip(window) => args.extend(Self::clip_args(window)),
        }

        args.push(output.to_string_lossy().to_string());

        ConversionSpec {
            input: input.to_path_buf(),
            output,
            args,
        }
    }

    /// Same directory and stem, new extension; `_converted` stem when it would collide
    pub fn output_path(input: &Path, extension: &str) -> PathBuf {
        let same_ext = input
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
            .unwrap_or(false);

        if !same_ext {
            return input.with_extension(extension);
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        input.with_file_name(format!("{}{}.{}", stem, CONVERTED_SUFFIX, extension))
    }

    fn audio_args(codec: AudioCodec) -> Vec<String> {
        let args: &[&str] = match codec {
            AudioCodec::Mp3 => &["-vn", "-ar", "44100", "-ac", "2", "-b:a", "320k"],
            AudioCodec::Aac => &["-vn", "-c:a", "aac", "-b:a", "320k"],
            AudioCodec::Wav => &["-vn"],
            AudioCodec::Opus => &["-vn", "-c:a", "libopus", "-b:a", "192k"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    fn video_args(resolution: Resolution) -> Vec<String> {
        let mut args = Vec::new();

        // -2 keeps the width even while preserving aspect ratio
        if let Resolution::Height(h) = resolution {
            args.push("-vf".to_string());
            args.push(format!("scale=-2:{}", h));
        }

        args.extend(
            [
                "-c:v", "libx264",
                "-crf", VIDEO_CRF,
                "-preset", VIDEO_PRESET,
                "-c:a", "aac",
                "-b:a", VIDEO_AUDIO_BITRATE,
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args
    }

    fn clip_args(window: &ClipWindow) -> Vec<String> {
        vec![
            "-ss".to_string(),
            window.start().to_string(),
            "-t".to_string(),
            window.duration().to_string(),
            "-vf".to_string(),
            CLIP_FILTER_GRAPH.to_string(),
        ]
    }
}
