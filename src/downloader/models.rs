// Common data models for jobs, downloaded media and job events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::errors::InputError;

/// Longest GIF clip a user may request, in seconds
pub const MAX_CLIP_SECONDS: f64 = 5.0;

/// URLs containing this marker are treated as playlists
pub const PLAYLIST_MARKER: &str = "list=";

/// Audio-only output containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Wav,
    Opus,
}

impl AudioCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Wav => "wav",
            Self::Opus => "opus",
        }
    }
}

/// Maximum video height for mp4 output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    Auto,
    Height(u32),
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }

        let digits = value.strip_suffix('p').unwrap_or(value);
        match digits.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Self::Height(height)),
            _ => Err(format!("invalid resolution '{}', expected Auto or a height like 720", s)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Height(h) => write!(f, "{}", h),
        }
    }
}

/// Validated [start, end] window for a GIF clip, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    start: f64,
    end: f64,
}

impl ClipWindow {
    pub fn new(start: f64, end: f64) -> Result<Self, InputError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(InputError::InvalidTime(format!("{} / {}", start, end)));
        }

        let duration = end - start;
        if duration > MAX_CLIP_SECONDS {
            return Err(InputError::ClipTooLong(duration));
        }
        if start >= end {
            return Err(InputError::ClipNotIncreasing);
        }

        Ok(Self { start, end })
    }

    /// Parse the raw "time in" / "time out" fields
    pub fn parse(start: &str, end: &str) -> Result<Self, InputError> {
        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| InputError::InvalidTime(raw.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// What the job produces
#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    Audio(AudioCodec),
    Video { resolution: Resolution },
    Clip(ClipWindow),
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio(codec) => codec.extension(),
            Self::Video { .. } => "mp4",
            Self::Clip(_) => "gif",
        }
    }
}

/// Output format as picked by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Mp3,
    Aac,
    Wav,
    Opus,
    Mp4,
    Gif,
}

impl OutputFormat {
    /// Kind for a download+convert job. Gif needs a clip window and has none.
    pub fn standard_kind(&self, resolution: Resolution) -> Option<OutputKind> {
        match self {
            Self::Mp3 => Some(OutputKind::Audio(AudioCodec::Mp3)),
            Self::Aac => Some(OutputKind::Audio(AudioCodec::Aac)),
            Self::Wav => Some(OutputKind::Audio(AudioCodec::Wav)),
            Self::Opus => Some(OutputKind::Audio(AudioCodec::Opus)),
            Self::Mp4 => Some(OutputKind::Video { resolution }),
            Self::Gif => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "aac" => Ok(Self::Aac),
            "wav" => Ok(Self::Wav),
            "opus" => Ok(Self::Opus),
            "mp4" => Ok(Self::Mp4),
            "gif" => Ok(Self::Gif),
            other => Err(format!(
                "unknown format '{}', expected one of mp3, aac, wav, opus, mp4, gif",
                other
            )),
        }
    }
}

/// Filename pattern applied to every output of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamingPreset {
    #[default]
    Default,
    LowercaseDash,
    Indexed,
}

impl NamingPreset {
    /// Unknown labels fall back to `Default`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "lowercase-dash" | "lowercasedash" | "lowercase_dash" => Self::LowercaseDash,
            "indexed" => Self::Indexed,
            _ => Self::Default,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::LowercaseDash => "Lowercase-Dash",
            Self::Indexed => "Indexed",
        }
    }

    /// yt-dlp output template
    pub fn output_template(&self) -> &'static str {
        match self {
            Self::Default => "%(title)s.%(ext)s",
            Self::LowercaseDash => "%(title)s-%(id)s.%(ext)s",
            Self::Indexed => "%(playlist_index)02d - %(title)s.%(ext)s",
        }
    }

    /// The filename `output_template` expands to
    pub fn render(&self, title: &str, id: &str, batch_index: u32, ext: &str) -> String {
        match self {
            Self::Default => format!("{}.{}", title, ext),
            Self::LowercaseDash => format!("{}-{}.{}", title, id, ext),
            Self::Indexed => format!("{:02} - {}.{}", batch_index, title, ext),
        }
    }
}

impl FromStr for NamingPreset {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

/// One user-initiated job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub naming: NamingPreset,
    pub kind: OutputKind,
    pub is_batch: bool,
}

impl JobRequest {
    /// Download+convert job. Batch mode follows the playlist marker in the URL.
    pub fn standard(
        url: &str,
        output_dir: impl Into<PathBuf>,
        naming: NamingPreset,
        kind: OutputKind,
    ) -> Result<Self, InputError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(InputError::EmptyUrl);
        }

        Ok(Self {
            url: url.to_string(),
            output_dir: output_dir.into(),
            naming,
            kind,
            is_batch: url.contains(PLAYLIST_MARKER),
        })
    }

    /// Clip job from the raw time fields. Checks the URL before the times.
    pub fn clip(
        url: &str,
        output_dir: impl Into<PathBuf>,
        naming: NamingPreset,
        start: &str,
        end: &str,
    ) -> Result<Self, InputError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(InputError::EmptyUrl);
        }
        let window = ClipWindow::parse(start, end)?;

        Ok(Self {
            url: url.to_string(),
            output_dir: output_dir.into(),
            naming,
            kind: OutputKind::Clip(window),
            is_batch: false,
        })
    }
}

/// A media file written by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub playlist_index: Option<u32>,
}

impl MediaFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            path,
            id: String::new(),
            title,
            ext,
            playlist_index: None,
        }
    }
}

/// One position in a playlist result
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Downloaded(MediaFile),
    /// Entry the extractor returned empty
    Unavailable,
    /// Extraction error for this entry only
    Failed(String),
}

/// Everything the extractor produced for one call
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadResult {
    /// No metadata came back at all
    Nothing,
    Single(MediaFile),
    Batch(Vec<BatchEntry>),
}

/// A fully resolved ffmpeg invocation (program excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSpec {
    pub input: PathBuf,
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl ConversionSpec {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Shell-ish rendering for logs
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| if a.contains(' ') { format!("\"{}\"", a) } else { a.clone() })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Download progress information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: Option<f32>,
    pub status: String,
}

/// Notifications delivered to the reporting surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobEvent {
    Log(String),
    Progress(DownloadProgress),
    /// Item skipped for an expected reason (geo restriction)
    Skipped(String),
    /// Item failed, the batch goes on
    ItemError(String),
    Finished(String),
    Failed(String),
    /// The runner accepts a new job again
    Ready,
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub converted: Vec<PathBuf>,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Finished { message: String, summary: JobSummary },
    Failed { message: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_render() {
        assert_eq!(NamingPreset::Default.render("Foo Bar", "abc123", 3, "mp3"), "Foo Bar.mp3");
        assert_eq!(
            NamingPreset::LowercaseDash.render("Foo Bar", "abc123", 3, "mp3"),
            "Foo Bar-abc123.mp3"
        );
        assert_eq!(NamingPreset::Indexed.render("Foo Bar", "abc123", 3, "mp3"), "03 - Foo Bar.mp3");
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        assert_eq!(NamingPreset::from_label("Snake_Case"), NamingPreset::Default);
        assert_eq!(NamingPreset::from_label("Lowercase-Dash"), NamingPreset::LowercaseDash);
        assert_eq!(NamingPreset::from_label("indexed"), NamingPreset::Indexed);
    }

    #[test]
    fn test_preset_label_parses_back() {
        for preset in [NamingPreset::Default, NamingPreset::LowercaseDash, NamingPreset::Indexed] {
            assert_eq!(NamingPreset::from_label(preset.label()), preset);
        }
    }

    #[test]
    fn test_clip_window_rules() {
        assert_eq!(ClipWindow::parse("0", "10"), Err(InputError::ClipTooLong(10.0)));
        assert_eq!(ClipWindow::parse("2", "2"), Err(InputError::ClipNotIncreasing));
        let ok = ClipWindow::parse("1", "4").unwrap();
        assert_eq!(ok.duration(), 3.0);
        assert_eq!((ok.start(), ok.end()), (1.0, 4.0));
        assert!(matches!(ClipWindow::parse("abc", "4"), Err(InputError::InvalidTime(_))));
        assert!(matches!(ClipWindow::parse("1", "inf"), Err(InputError::InvalidTime(_))));
    }

    #[test]
    fn test_clip_request_checks_url_first() {
        let err = JobRequest::clip("  ", "/tmp", NamingPreset::Default, "x", "y").unwrap_err();
        assert_eq!(err, InputError::EmptyUrl);
    }

    #[test]
    fn test_playlist_marker_sets_batch() {
        let kind = OutputKind::Audio(AudioCodec::Mp3);
        let single = JobRequest::standard("https://youtu.be/abc", "/tmp", NamingPreset::Default, kind.clone())
            .unwrap();
        let batch = JobRequest::standard(
            "https://www.youtube.com/playlist?list=PL123",
            "/tmp",
            NamingPreset::Default,
            kind,
        )
        .unwrap();
        assert!(!single.is_batch);
        assert!(batch.is_batch);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("Auto".parse::<Resolution>(), Ok(Resolution::Auto));
        assert_eq!("720".parse::<Resolution>(), Ok(Resolution::Height(720)));
        assert_eq!("1080p".parse::<Resolution>(), Ok(Resolution::Height(1080)));
        assert!("0".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_gif_has_no_standard_kind() {
        assert_eq!(OutputFormat::Gif.standard_kind(Resolution::Auto), None);
        assert_eq!(
            OutputFormat::Opus.standard_kind(Resolution::Height(720)),
            Some(OutputKind::Audio(AudioCodec::Opus))
        );
    }

    #[test]
    fn test_media_file_from_ytdlp_json() {
        let json = r#"{"id":"abc123","title":"Foo Bar","ext":"webm","filepath":"/out/Foo Bar.webm","playlist_index":2}"#;
        let media: MediaFile = serde_json::from_str(json).unwrap();
        assert_eq!(media.path, PathBuf::from("/out/Foo Bar.webm"));
        assert_eq!(media.playlist_index, Some(2));
    }
}
