// Command-line front end: parses flags, submits one job, prints its events

use anyhow::Context;
use clap::Parser;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::downloader::errors::SubmitError;
use crate::downloader::models::{JobEvent, JobRequest, NamingPreset, OutputFormat, Resolution};
use crate::downloader::{
    ExtractorConfig, ExtractorMode, FfmpegTranscoder, JobRunner, ToolManager, ToolType, YtDlpExtractor,
};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "video-downloader",
    version,
    about = "Download a video or playlist and convert it to audio, mp4 or a short GIF"
)]
pub struct Args {
    /// Video or playlist URL
    #[arg(value_name = "URL", required_unless_present = "check_tools")]
    pub url: Option<String>,

    /// Output directory (defaults to the Downloads folder)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// mp3, aac, wav, opus, mp4 or gif
    #[arg(short, long, default_value = "mp3")]
    pub format: OutputFormat,

    /// Default, Lowercase-Dash or Indexed
    #[arg(short, long, default_value = "Default")]
    pub naming: NamingPreset,

    /// Maximum height for mp4 output: Auto, 720, 1080
    #[arg(short, long, default_value = "Auto")]
    pub resolution: Resolution,

    /// GIF start time in seconds
    #[arg(long, value_name = "SECONDS", allow_hyphen_values = true)]
    pub start: Option<String>,

    /// GIF end time in seconds
    #[arg(long, value_name = "SECONDS", allow_hyphen_values = true)]
    pub end: Option<String>,

    /// How to launch yt-dlp: auto, cli or python
    #[arg(long, default_value = "auto")]
    pub extractor: ExtractorMode,

    #[arg(long, env = "YTDLP_PATH", value_name = "PATH")]
    pub ytdlp: Option<String>,

    /// Python interpreter with the yt_dlp module
    #[arg(long, env = "YTDLP_PYTHON", value_name = "CMD")]
    pub python: Option<String>,

    #[arg(long, env = "FFMPEG_PATH", value_name = "PATH")]
    pub ffmpeg: Option<String>,

    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// cookies.txt in Netscape format
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<String>,

    #[arg(long, value_name = "BROWSER")]
    pub cookies_from_browser: Option<String>,

    #[arg(long, value_name = "SECONDS")]
    pub socket_timeout: Option<u32>,

    /// Kill a single ffmpeg run after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub transcode_timeout: Option<u64>,

    /// Print detected tools as JSON and exit
    #[arg(long)]
    pub check_tools: bool,

    /// Print job events as JSON lines
    #[arg(long)]
    pub json: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Run the requested action. Ok(false) means the job or its input failed.
pub async fn execute(args: Args) -> anyhow::Result<bool> {
    // Tool discovery shells out to which/python; keep it off the async workers
    if args.check_tools {
        let tools = tokio::task::spawn_blocking(|| ToolManager::new().get_all_tools())
            .await
            .context("Tool detection failed")?;
        let report = serde_json::to_string_pretty(&tools)?;
        println!("{}", report);
        return Ok(true);
    }

    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => match dirs::download_dir() {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to read current directory")?,
        },
    };

    let request = match build_request(&args, &output_dir) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(false);
        }
    };

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let setup = args.clone();
    let runner = tokio::task::spawn_blocking(move || build_runner(&setup))
        .await
        .context("Tool detection failed")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = runner.submit(request, tx)?;

    while let Some(event) = rx.recv().await {
        print_event(&event, args.json);
    }

    let outcome = handle.await.context("Job task terminated unexpectedly")?;
    Ok(outcome.is_success())
}

/// Resolve tools and wire up the job runner. Blocks on tool probing.
fn build_runner(args: &Args) -> JobRunner {
    let tools = ToolManager::new();

    let config = ExtractorConfig::default()
        .with_mode(args.extractor)
        .with_ytdlp_path(args.ytdlp.clone())
        .with_python_cmd(args.python.clone())
        .with_ffmpeg_location(tools.resolve(ToolType::Ffmpeg, args.ffmpeg.as_deref()))
        .with_proxy(args.proxy.clone())
        .with_cookies_path(args.cookies.clone())
        .with_cookies_from_browser(args.cookies_from_browser.clone())
        .with_socket_timeout(args.socket_timeout);

    let ffmpeg = tools.resolve_or_default(ToolType::Ffmpeg, args.ffmpeg.as_deref());
    let transcoder = FfmpegTranscoder::new(ffmpeg).with_timeout(args.transcode_timeout);
    JobRunner::new(Arc::new(YtDlpExtractor::new(config)), Arc::new(transcoder))
}

fn build_request(args: &Args, output_dir: &Path) -> Result<JobRequest, SubmitError> {
    let url = args.url.as_deref().unwrap_or_default();

    let request = match args.format.standard_kind(args.resolution) {
        Some(kind) => JobRequest::standard(url, output_dir, args.naming, kind)?,
        None => JobRequest::clip(
            url,
            output_dir,
            args.naming,
            args.start.as_deref().unwrap_or_default(),
            args.end.as_deref().unwrap_or_default(),
        )?,
    };
    Ok(request)
}

fn print_event(event: &JobEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }

    match event {
        JobEvent::Log(message) | JobEvent::Skipped(message) | JobEvent::Finished(message) => {
            println!("{}", message)
        }
        JobEvent::Progress(progress) if progress.percent == Some(100.0) => println!("{}", progress.status),
        JobEvent::Progress(progress) => println!("Download progress: {}", progress.status),
        JobEvent::ItemError(message) | JobEvent::Failed(message) => eprintln!("Error: {}", message),
        JobEvent::Ready => debug!("[Job] Ready"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::InputError;
    use crate::downloader::models::OutputKind;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["video-downloader", "https://youtu.be/abc"]);
        assert_eq!(args.format, OutputFormat::Mp3);
        assert_eq!(args.naming, NamingPreset::Default);
        assert_eq!(args.resolution, Resolution::Auto);
        assert_eq!(args.extractor, ExtractorMode::Auto);
        assert_eq!(args.transcode_timeout, None);
    }

    #[test]
    fn test_url_required_unless_checking_tools() {
        assert!(Args::try_parse_from(["video-downloader"]).is_err());
        assert!(parse(&["video-downloader", "--check-tools"]).check_tools);
    }

    #[test]
    fn test_mp4_request_keeps_resolution() {
        let args = parse(&["video-downloader", "-f", "mp4", "-r", "720", "https://youtu.be/abc"]);
        let request = build_request(&args, Path::new("/tmp/out")).unwrap();
        assert_eq!(
            request.kind,
            OutputKind::Video {
                resolution: Resolution::Height(720)
            }
        );
        assert!(!request.is_batch);
    }

    #[test]
    fn test_gif_request_validation() {
        let args = parse(&["video-downloader", "-f", "gif", "--start", "0", "--end", "10", "https://youtu.be/abc"]);
        assert!(matches!(
            build_request(&args, Path::new("/tmp")),
            Err(SubmitError::Input(InputError::ClipTooLong(d))) if d == 10.0
        ));

        let missing = parse(&["video-downloader", "-f", "gif", "https://youtu.be/abc"]);
        assert!(matches!(
            build_request(&missing, Path::new("/tmp")),
            Err(SubmitError::Input(InputError::InvalidTime(_)))
        ));

        let ok = parse(&["video-downloader", "-f", "gif", "--start", "1", "--end", "4", "https://youtu.be/abc"]);
        assert!(matches!(build_request(&ok, Path::new("/tmp")).unwrap().kind, OutputKind::Clip(_)));
    }

    #[test]
    fn test_blank_url_rejected_first() {
        let args = parse(&["video-downloader", "-f", "gif", "--start", "x", "   "]);
        let err = build_request(&args, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, SubmitError::Input(InputError::EmptyUrl)));
        assert_eq!(err.to_string(), "Please enter a valid URL.");
    }

    #[tokio::test]
    async fn test_runner_setup_runs_off_the_async_workers() {
        let args = parse(&[
            "video-downloader",
            "--extractor",
            "cli",
            "--ytdlp",
            "/opt/tools/yt-dlp",
            "--ffmpeg",
            "/opt/tools/ffmpeg",
            "https://youtu.be/abc",
        ]);
        let runner = tokio::task::spawn_blocking(move || build_runner(&args)).await.unwrap();
        assert!(!runner.is_busy());
    }
}
