// Error types for extraction, transcoding and job submission

use std::path::PathBuf;
use thiserror::Error;

use super::models::MAX_CLIP_SECONDS;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Network timeout while talking to the remote site
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// The site refused the request (429, bot detection, etc.)
    #[error("The remote site blocked the request: {0}")]
    Blocked(String),

    /// yt-dlp or python not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// URL the extractor does not understand
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Unknown error with details
    #[error("{0}")]
    Unknown(String),
}

// Classify raw yt-dlp stderr text
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        // "timeout" alone also shows up in URLs and option names
        if lower.contains("timed out") || lower.contains("timeouterror") || lower.contains("read timeout") {
            return Self::NetworkTimeout(s);
        }

        if lower.contains("429") || lower.contains("too many requests") || lower.contains("confirm you're not a bot") {
            return Self::Blocked(s);
        }

        if lower.contains("command not found") || lower.contains("no such file or directory") {
            return Self::ToolNotFound(s);
        }

        if s.contains("Unsupported URL") || s.contains("is not a valid URL") || s.contains("Invalid URL") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("json") {
            return Self::ParseError(s);
        }

        Self::Unknown(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

/// ffmpeg failures for a single conversion
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start ffmpeg ({program}): {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg exited with {status} while writing {output}: {stderr}")]
    Failed {
        status: String,
        output: PathBuf,
        stderr: String,
    },

    #[error("ffmpeg timed out after {0}s")]
    TimedOut(u64),
}

/// Rejected user input; no job is created
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Please enter a valid URL.")]
    EmptyUrl,

    #[error("Invalid time input.")]
    InvalidTime(String),

    #[error("GIF duration cannot exceed {} seconds.", MAX_CLIP_SECONDS)]
    ClipTooLong(f64),

    #[error("Time In must be less than Time Out.")]
    ClipNotIncreasing,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("A job is already running")]
    Busy,

    #[error(transparent)]
    Input(#[from] InputError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        let err = DownloadError::from(
            "[youtube] abc: Unable to download webpage: The read operation timed out".to_string(),
        );
        assert!(matches!(err, DownloadError::NetworkTimeout(_)));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_timeout_in_url_is_not_a_timeout() {
        let err = DownloadError::from("Unsupported URL: https://example.com/?timeout=30".to_string());
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn test_unsupported_url_classification() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com/".to_string());
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
    }

    #[test]
    fn test_unknown_keeps_message() {
        let err = DownloadError::from("ERROR: something odd".to_string());
        assert_eq!(err.to_string(), "ERROR: something odd");
    }

    #[test]
    fn test_clip_messages() {
        assert_eq!(
            InputError::ClipTooLong(10.0).to_string(),
            "GIF duration cannot exceed 5 seconds."
        );
        assert_eq!(
            InputError::ClipNotIncreasing.to_string(),
            "Time In must be less than Time Out."
        );
    }
}
