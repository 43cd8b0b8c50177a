// Extractor configuration and per-call options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How yt-dlp is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractorMode {
    /// Python module yt_dlp (`python3 -m yt_dlp`)
    Python,
    /// CLI binary yt-dlp
    Cli,
    /// Auto-select: CLI → Python fallback
    #[default]
    Auto,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ExtractorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "cli" => Ok(Self::Cli),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown extractor mode '{}', expected auto, cli or python", other)),
        }
    }
}

/// Process-wide settings for the extractor
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Extraction mode (Python, CLI, or Auto)
    pub mode: ExtractorMode,
    /// Explicit yt-dlp binary
    pub ytdlp_path: Option<String>,
    /// Explicit Python interpreter for module mode
    pub python_cmd: Option<String>,
    /// ffmpeg handed to yt-dlp for stream merging
    pub ffmpeg_location: Option<String>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Browser to read cookies from (chrome, firefox, ...)
    pub cookies_from_browser: Option<String>,
    /// Socket timeout in seconds; yt-dlp's own default when unset
    pub socket_timeout: Option<u32>,
}

impl ExtractorConfig {
    pub fn with_mode(mut self, mode: ExtractorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_python_cmd(mut self, cmd: Option<String>) -> Self {
        self.python_cmd = cmd;
        self
    }

    pub fn with_ffmpeg_location(mut self, path: Option<String>) -> Self {
        self.ffmpeg_location = path;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: Option<u32>) -> Self {
        self.socket_timeout = seconds;
        self
    }
}

/// What a single extractor call should fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// yt-dlp `-f` selector
    pub selector: String,
    /// Output path template, directory included
    pub output_template: String,
    /// Follow playlists (`--yes-playlist`) instead of the single video
    pub playlist: bool,
    /// Container for merged video+audio downloads
    pub merge_container: Option<String>,
    /// Skip failing playlist entries instead of aborting
    pub ignore_errors: bool,
}
