use async_trait::async_trait;
use log::{debug, warn};

use crate::downloader::errors::TranscodeError;
use crate::downloader::models::ConversionSpec;
use crate::downloader::traits::Transcoder;
use crate::downloader::utils::{run_output_with_timeout, tail_lines};

/// Lines of ffmpeg stderr kept in a failure message
const STDERR_TAIL: usize = 5;

pub struct FfmpegTranscoder {
    program: String,
    timeout_secs: Option<u64>,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout_secs: None,
        }
    }

    /// Kill conversions running longer than `secs`
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(&self, spec: &ConversionSpec) -> Result<(), TranscodeError> {
        debug!("[ffmpeg] {} {}", self.program, spec.display_args());

        let output = run_output_with_timeout(&self.program, &spec.args, self.timeout_secs)
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match output {
            Some(output) => output,
            None => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!("[ffmpeg] Killed after {}s: {}", secs, spec.output().display());
                return Err(TranscodeError::TimedOut(secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::Failed {
                status: output.status.to_string(),
                output: spec.output().to_path_buf(),
                stderr: tail_lines(&stderr, STDERR_TAIL),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec() -> ConversionSpec {
        ConversionSpec {
            input: PathBuf::from("/nonexistent/in.webm"),
            output: PathBuf::from("/nonexistent/in.mp3"),
            args: vec!["-y".to_string(), "-i".to_string(), "/nonexistent/in.webm".to_string()],
        }
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_spawn_error() {
        let transcoder = FfmpegTranscoder::new("definitely-not-ffmpeg-xyz");
        let err = transcoder.transcode(&spec()).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Spawn { .. }));
        assert!(err.to_string().contains("definitely-not-ffmpeg-xyz"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failed() {
        // `false` ignores its arguments and exits 1
        let transcoder = FfmpegTranscoder::new("false");
        let err = transcoder.transcode(&spec()).await.unwrap_err();
        match err {
            TranscodeError::Failed { output, .. } => assert_eq!(output, PathBuf::from("/nonexistent/in.mp3")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_opt_in() {
        let transcoder = FfmpegTranscoder::new("ffmpeg");
        assert_eq!(transcoder.timeout_secs, None);
        assert_eq!(transcoder.with_timeout(Some(30)).timeout_secs, Some(30));
    }
}
