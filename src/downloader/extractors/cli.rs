// yt-dlp extractor - drives the yt-dlp binary or `python3 -m yt_dlp`
//
// yt-dlp does the downloading. We only ask it to print two kinds of marker
// lines and read them back from the merged stdout/stderr stream:
// - `__progress__|<status>|<percent>` for every progress tick
// - `__item__|<json>` once per finished file, after post-processing
// Anything starting with `ERROR:` is a failure of the current entry.

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;

use super::python;
use super::traits::{ExtractOptions, ExtractorConfig, ExtractorMode};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{BatchEntry, DownloadProgress, DownloadResult, MediaFile};
use crate::downloader::tools::{ToolManager, ToolType};
use crate::downloader::traits::{MediaExtractor, ProgressEmitter};
use crate::downloader::utils::{clean_progress, forward_lines, StreamLine};

const PROGRESS_MARKER: &str = "__progress__|";
const ITEM_MARKER: &str = "__item__|";

const PROGRESS_TEMPLATE: &str = "download:__progress__|%(progress.status)s|%(progress._percent_str)s";
const ITEM_TEMPLATE: &str = "after_move:__item__|%(.{id,title,ext,filepath,playlist_index})j";

lazy_static! {
    // "Downloading item 2 of 5" (older builds say "video"), "Downloading playlist: ..."
    static ref PLAYLIST_LINE_RE: Regex =
        Regex::new(r"^\[download\] Downloading (?:(?:item|video) \d+ of \d+|playlist)").unwrap();
}

/// How yt-dlp gets started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub program: String,
    pub prefix: Vec<String>,
    pub label: &'static str,
}

impl Launcher {
    fn binary(program: String) -> Self {
        Self {
            program,
            prefix: Vec::new(),
            label: "yt-dlp",
        }
    }

    fn module(python: String) -> Self {
        Self {
            program: python,
            prefix: python::module_prefix(),
            label: "python -m yt_dlp",
        }
    }
}

/// One classified line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
enum OutputLine {
    Progress(DownloadProgress),
    Item(BatchEntry),
    Error(String),
    Warning(String),
    /// yt-dlp moved on to a playlist entry
    PlaylistEntry(String),
    Other(String),
}

fn parse_line(raw: &str) -> OutputLine {
    let line = raw.trim();

    // Progress marker may be prefixed by a carriage-return redraw
    if let Some(pos) = line.find(PROGRESS_MARKER) {
        let rest = &line[pos + PROGRESS_MARKER.len()..];
        let (status, percent) = rest.split_once('|').unwrap_or((rest, ""));
        return OutputLine::Progress(parse_progress(status, percent));
    }

    if let Some(json) = line.strip_prefix(ITEM_MARKER) {
        return match parse_item(json) {
            Ok(entry) => OutputLine::Item(entry),
            Err(e) => OutputLine::Error(format!("Could not read item metadata: {}", e)),
        };
    }

    if let Some(msg) = line.strip_prefix("ERROR:") {
        return OutputLine::Error(msg.trim().to_string());
    }

    if let Some(msg) = line.strip_prefix("WARNING:") {
        return OutputLine::Warning(msg.trim().to_string());
    }

    if PLAYLIST_LINE_RE.is_match(line) {
        return OutputLine::PlaylistEntry(line.to_string());
    }

    OutputLine::Other(line.to_string())
}

fn parse_progress(status: &str, percent: &str) -> DownloadProgress {
    if status.trim() == "finished" {
        return DownloadProgress {
            percent: Some(100.0),
            status: "Download complete".to_string(),
        };
    }

    let cleaned = clean_progress(percent);
    DownloadProgress {
        percent: cleaned.trim_end_matches('%').trim().parse::<f32>().ok(),
        status: cleaned,
    }
}

fn parse_item(json: &str) -> Result<BatchEntry, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    let has_path = value["filepath"]
        .as_str()
        .map(|p| !p.trim().is_empty())
        .unwrap_or(false);
    if !has_path {
        return Ok(BatchEntry::Unavailable);
    }

    let media: MediaFile = serde_json::from_value(value)?;
    Ok(BatchEntry::Downloaded(media))
}

/// Accumulates entries in the order yt-dlp reports them
#[derive(Debug, Default)]
struct EntryCollector {
    entries: Vec<BatchEntry>,
    errors: Vec<String>,
    playlist_started: bool,
}

impl EntryCollector {
    fn push_entry(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    fn push_error(&mut self, message: String) {
        self.entries.push(BatchEntry::Failed(message.clone()));
        self.errors.push(message);
    }

    fn mark_playlist_entry(&mut self) {
        self.playlist_started = true;
    }

    /// yt-dlp got as far as individual entries
    fn reached_entries(&self) -> bool {
        self.playlist_started || !self.entries.is_empty()
    }

    fn fatal_error(&self, status: &str) -> DownloadError {
        if self.errors.is_empty() {
            DownloadError::ExecutionError(format!("yt-dlp exited with {}", status))
        } else {
            DownloadError::from(self.errors.join("\n"))
        }
    }

    fn finish(self, playlist: bool, success: bool, status: &str) -> Result<DownloadResult, DownloadError> {
        if !playlist {
            let first = self.entries.iter().find_map(|e| match e {
                BatchEntry::Downloaded(media) => Some(media.clone()),
                _ => None,
            });
            return match first {
                Some(media) => Ok(DownloadResult::Single(media)),
                None if !success => Err(self.fatal_error(status)),
                None => Ok(DownloadResult::Nothing),
            };
        }

        // Failed entries belong to the batch; only a run that never got to
        // an entry is a failure of the whole request
        if !success && !self.reached_entries() {
            return Err(self.fatal_error(status));
        }
        if self.entries.is_empty() {
            return Ok(DownloadResult::Nothing);
        }
        Ok(DownloadResult::Batch(self.entries))
    }
}

/// MediaExtractor backed by yt-dlp
pub struct YtDlpExtractor {
    config: ExtractorConfig,
    launcher: Launcher,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let launcher = Self::resolve_launcher(&config, &ToolManager::new());
        info!("[yt-dlp] Using {} ({})", launcher.label, launcher.program);
        Self { config, launcher }
    }

    /// Auto prefers the binary and falls back to the Python module
    fn resolve_launcher(config: &ExtractorConfig, tools: &ToolManager) -> Launcher {
        let explicit = config.ytdlp_path.as_deref();

        match config.mode {
            ExtractorMode::Cli => Launcher::binary(tools.resolve_or_default(ToolType::YtDlp, explicit)),
            ExtractorMode::Python => Launcher::module(python::find_python(config.python_cmd.as_deref())),
            ExtractorMode::Auto => {
                if let Some(path) = tools.resolve(ToolType::YtDlp, explicit) {
                    return Launcher::binary(path);
                }

                let python = python::find_python(config.python_cmd.as_deref());
                if python::has_ytdlp_module(&python) {
                    debug!("[yt-dlp] Binary not found, using Python module via {}", python);
                    Launcher::module(python)
                } else {
                    Launcher::binary(tools.resolve_or_default(ToolType::YtDlp, None))
                }
            }
        }
    }

    /// Build command arguments
    pub fn build_args(&self, url: &str, options: &ExtractOptions) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            options.selector.clone(),
            "-o".to_string(),
            options.output_template.clone(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            ITEM_TEMPLATE.to_string(),
        ];

        if options.playlist {
            args.push("--yes-playlist".to_string());
        } else {
            args.push("--no-playlist".to_string());
        }

        if options.ignore_errors {
            args.push("--ignore-errors".to_string());
        }

        if let Some(container) = &options.merge_container {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        if let Some(location) = &self.config.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.clone());
        }

        // Proxy
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        // Cookies
        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        } else if let Some(browser) = &self.config.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        if let Some(seconds) = self.config.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(seconds.to_string());
        }

        args.push(url.to_string());
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> DownloadError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DownloadError::ToolNotFound(format!("{} ({})", self.launcher.label, self.launcher.program))
        } else {
            DownloadError::ExecutionError(format!("Failed to start {}: {}", self.launcher.label, e))
        }
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        self.launcher.label
    }

    async fn extract(
        &self,
        url: &str,
        options: &ExtractOptions,
        progress: &ProgressEmitter,
    ) -> Result<DownloadResult, DownloadError> {
        let args = self.build_args(url, options);
        debug!(
            "[yt-dlp] {} {} {}",
            self.launcher.program,
            self.launcher.prefix.join(" "),
            args.join(" ")
        );

        let mut child = TokioCommand::new(&self.launcher.program)
            .args(&self.launcher.prefix)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = forward_lines(stdout, tx.clone(), StreamLine::Stdout);
        let stderr_task = forward_lines(stderr, tx, StreamLine::Stderr);

        let mut collector = EntryCollector::default();
        while let Some(line) = rx.recv().await {
            let text = match line {
                StreamLine::Stdout(text) | StreamLine::Stderr(text) => text,
            };

            match parse_line(&text) {
                OutputLine::Progress(p) => progress.progress(p),
                OutputLine::Item(entry) => {
                    if let BatchEntry::Downloaded(media) = &entry {
                        debug!("[yt-dlp] Finished item: {}", media.path.display());
                    }
                    collector.push_entry(entry);
                }
                OutputLine::Error(msg) => {
                    warn!("[yt-dlp] {}", msg);
                    collector.push_error(msg);
                }
                OutputLine::Warning(msg) => warn!("[yt-dlp] {}", msg),
                OutputLine::PlaylistEntry(msg) => {
                    debug!("[yt-dlp] {}", msg);
                    collector.mark_playlist_entry();
                }
                OutputLine::Other(msg) if !msg.is_empty() => debug!("[yt-dlp] {}", msg),
                OutputLine::Other(_) => {}
            }
        }

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(e.to_string()))?;

        collector.finish(options.playlist, status.success(), &status.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn options(playlist: bool) -> ExtractOptions {
        ExtractOptions {
            selector: "bestaudio/best".to_string(),
            output_template: "/out/%(title)s.%(ext)s".to_string(),
            playlist,
            merge_container: None,
            ignore_errors: playlist,
        }
    }

    fn extractor(config: ExtractorConfig) -> YtDlpExtractor {
        YtDlpExtractor {
            config,
            launcher: Launcher::binary("yt-dlp".to_string()),
        }
    }

    fn media(path: &str) -> MediaFile {
        MediaFile::from_path(path)
    }

    #[test]
    fn test_build_args_single() {
        let args = extractor(ExtractorConfig::default()).build_args("https://youtu.be/abc", &options(false));
        assert_eq!(&args[..4], &["-f", "bestaudio/best", "-o", "/out/%(title)s.%(ext)s"]);
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--ignore-errors".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_build_args_playlist_and_network() {
        let config = ExtractorConfig::default()
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_cookies_from_browser(Some("firefox".to_string()))
            .with_socket_timeout(Some(20));
        let mut opts = options(true);
        opts.merge_container = Some("mp4".to_string());

        let args = extractor(config).build_args("https://youtube.com/playlist?list=PL1", &opts);
        let joined = args.join(" ");
        assert!(joined.contains("--yes-playlist --ignore-errors --merge-output-format mp4"));
        assert!(joined.contains("--proxy socks5://127.0.0.1:1080"));
        assert!(joined.contains("--cookies-from-browser firefox"));
        assert!(joined.contains("--socket-timeout 20"));
    }

    #[test]
    fn test_cookie_file_beats_browser() {
        let config = ExtractorConfig::default()
            .with_cookies_path(Some("/tmp/cookies.txt".to_string()))
            .with_cookies_from_browser(Some("chrome".to_string()));
        let args = extractor(config).build_args("u", &options(false));
        assert!(args.contains(&"/tmp/cookies.txt".to_string()));
        assert!(!args.contains(&"--cookies-from-browser".to_string()));
    }

    #[test]
    fn test_parse_progress_lines() {
        assert_eq!(
            parse_line("__progress__|downloading|  42.5%"),
            OutputLine::Progress(DownloadProgress {
                percent: Some(42.5),
                status: "42.5%".to_string()
            })
        );
        assert_eq!(
            parse_line("__progress__|finished|100%"),
            OutputLine::Progress(DownloadProgress {
                percent: Some(100.0),
                status: "Download complete".to_string()
            })
        );
    }

    #[test]
    fn test_parse_item_and_errors() {
        let line = r#"__item__|{"id":"abc","title":"Song","ext":"webm","filepath":"/out/Song.webm","playlist_index":1}"#;
        match parse_line(line) {
            OutputLine::Item(BatchEntry::Downloaded(m)) => {
                assert_eq!(m.path, PathBuf::from("/out/Song.webm"));
                assert_eq!(m.playlist_index, Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(
            parse_line(r#"__item__|{"id":"abc","filepath":null}"#),
            OutputLine::Item(BatchEntry::Unavailable)
        );
        assert_eq!(
            parse_line("ERROR: [youtube] abc: Video unavailable"),
            OutputLine::Error("[youtube] abc: Video unavailable".to_string())
        );
        assert!(matches!(parse_line("WARNING: slow"), OutputLine::Warning(_)));
        assert!(matches!(parse_line("[download] Destination: x"), OutputLine::Other(_)));
    }

    #[test]
    fn test_single_finish_rules() {
        let mut collector = EntryCollector::default();
        collector.push_entry(BatchEntry::Downloaded(media("/out/a.webm")));
        assert_eq!(
            collector.finish(false, true, "0").unwrap(),
            DownloadResult::Single(media("/out/a.webm"))
        );

        let mut failed = EntryCollector::default();
        failed.push_error("Unsupported URL: https://example.com".to_string());
        assert!(matches!(failed.finish(false, false, "1"), Err(DownloadError::InvalidUrl(_))));

        assert_eq!(
            EntryCollector::default().finish(false, true, "0").unwrap(),
            DownloadResult::Nothing
        );
    }

    #[test]
    fn test_playlist_keeps_arrival_order() {
        let mut collector = EntryCollector::default();
        collector.push_entry(BatchEntry::Downloaded(media("/out/1.webm")));
        collector.push_error("Video unavailable. blocked".to_string());
        collector.push_entry(BatchEntry::Downloaded(media("/out/3.webm")));

        // yt-dlp exits non-zero when any entry failed
        match collector.finish(true, false, "1").unwrap() {
            DownloadResult::Batch(entries) => {
                assert_eq!(entries.len(), 3);
                assert!(matches!(entries[1], BatchEntry::Failed(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_all_geo_blocked_playlist_is_a_batch() {
        let mut collector = EntryCollector::default();
        for id in ["a", "b", "c"] {
            collector.push_error(format!("[youtube] {}: Video unavailable. blocked in your country", id));
        }

        match collector.finish(true, false, "exit status: 1").unwrap() {
            DownloadResult::Batch(entries) => {
                assert_eq!(entries.len(), 3);
                assert!(entries.iter().all(|e| matches!(e, BatchEntry::Failed(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_playlist_marker_without_items_is_not_fatal() {
        let mut collector = EntryCollector::default();
        assert_eq!(
            parse_line("[download] Downloading item 1 of 3"),
            OutputLine::PlaylistEntry("[download] Downloading item 1 of 3".to_string())
        );
        collector.mark_playlist_entry();
        assert_eq!(collector.finish(true, false, "exit status: 1").unwrap(), DownloadResult::Nothing);
    }

    #[test]
    fn test_single_timeout_keeps_video_id() {
        let mut collector = EntryCollector::default();
        collector.push_error("[youtube] abc: Unable to download webpage: The read operation timed out".to_string());
        let err = collector.finish(false, false, "exit status: 1").unwrap_err();
        assert!(matches!(err, DownloadError::NetworkTimeout(_)));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_playlist_without_downloads_is_fatal() {
        let collector = EntryCollector::default();
        assert!(matches!(
            collector.finish(true, false, "exit status: 2"),
            Err(DownloadError::ExecutionError(_))
        ));
    }

    #[test]
    fn test_explicit_binary_in_cli_mode() {
        let config = ExtractorConfig::default()
            .with_mode(ExtractorMode::Cli)
            .with_ytdlp_path(Some("/opt/yt-dlp".to_string()));
        let launcher = YtDlpExtractor::resolve_launcher(&config, &ToolManager::with_bundle_dir("/nonexistent"));
        assert_eq!(launcher, Launcher::binary("/opt/yt-dlp".to_string()));
    }

    #[test]
    fn test_python_mode_uses_module() {
        let config = ExtractorConfig::default()
            .with_mode(ExtractorMode::Python)
            .with_python_cmd(Some("/venv/bin/python".to_string()));
        let launcher = YtDlpExtractor::resolve_launcher(&config, &ToolManager::with_bundle_dir("/nonexistent"));
        assert_eq!(launcher.program, "/venv/bin/python");
        assert_eq!(launcher.prefix, vec!["-m", "yt_dlp"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let extractor = YtDlpExtractor {
            config: ExtractorConfig::default(),
            launcher: Launcher::binary("definitely-not-yt-dlp-xyz".to_string()),
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = extractor
            .extract("https://youtu.be/abc", &options(false), &ProgressEmitter::new(tx))
            .await;
        assert!(matches!(result, Err(DownloadError::ToolNotFound(_))));
    }
}
