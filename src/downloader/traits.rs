// Extractor / transcoder trait definitions

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::errors::{DownloadError, TranscodeError};
use super::extractors::ExtractOptions;
use super::models::{ConversionSpec, DownloadProgress, DownloadResult, JobEvent};

/// Something that fetches media for a URL and writes it to disk
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Download everything `url` resolves to. Per-entry failures of a playlist
    /// come back inside the result; `Err` means the whole call failed.
    async fn extract(
        &self,
        url: &str,
        options: &ExtractOptions,
        progress: &ProgressEmitter,
    ) -> Result<DownloadResult, DownloadError>;
}

/// Something that runs one conversion to completion
#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcode(&self, spec: &ConversionSpec) -> Result<(), TranscodeError>;
}

/// Progress emitter helper
///
/// Sends never block; a dropped receiver just discards events.
#[derive(Clone)]
pub struct ProgressEmitter {
    tx: UnboundedSender<JobEvent>,
}

impl ProgressEmitter {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(JobEvent::Log(message.into()));
    }

    pub fn progress(&self, progress: DownloadProgress) {
        self.emit(JobEvent::Progress(progress));
    }
}
