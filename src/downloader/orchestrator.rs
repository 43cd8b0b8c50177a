// Job runner - one download+convert job at a time
//
// Standard job: extractor call -> for each produced file: convert, delete source.
// Clip job: download full video to a temp file -> cut GIF -> delete temp file.
// Every job ends with exactly one Finished/Failed event followed by Ready.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::errors::{DownloadError, SubmitError};
use super::extractors::{diagnose_error, is_geo_restriction, BlockingReason, ExtractOptions};
use super::format_selector::{
    FormatSelector, CLIP_SOURCE_CONTAINER, CLIP_SOURCE_SELECTOR, CLIP_TEMP_NAME,
};
use super::models::{
    BatchEntry, DownloadResult, JobEvent, JobOutcome, JobRequest, JobSummary, MediaFile, OutputKind,
};
use super::traits::{MediaExtractor, ProgressEmitter, Transcoder};

pub const FINISHED_MESSAGE: &str = "Download and conversion finished!";

pub struct JobRunner {
    extractor: Arc<dyn MediaExtractor>,
    transcoder: Arc<dyn Transcoder>,
    busy: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(extractor: Arc<dyn MediaExtractor>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            extractor,
            transcoder,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start `request` on a tokio task. Must be called inside a runtime.
    ///
    /// Events go to `tx`; the handle resolves to the same outcome that was
    /// reported as the terminal event.
    pub fn submit(
        &self,
        request: JobRequest,
        tx: UnboundedSender<JobEvent>,
    ) -> Result<JoinHandle<JobOutcome>, SubmitError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }

        let emitter = ProgressEmitter::new(tx);
        let guard = BusyGuard {
            flag: Arc::clone(&self.busy),
            emitter: emitter.clone(),
        };
        let job = Job {
            extractor: Arc::clone(&self.extractor),
            transcoder: Arc::clone(&self.transcoder),
            emitter,
        };

        Ok(tokio::spawn(async move {
            let _guard = guard;
            let outcome = job.run(request).await;
            job.report(&outcome);
            outcome
        }))
    }
}

/// Clears the busy flag and announces Ready, also when the job task panics
struct BusyGuard {
    flag: Arc<AtomicBool>,
    emitter: ProgressEmitter,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.emitter.emit(JobEvent::Ready);
    }
}

struct Job {
    extractor: Arc<dyn MediaExtractor>,
    transcoder: Arc<dyn Transcoder>,
    emitter: ProgressEmitter,
}

impl Job {
    async fn run(&self, request: JobRequest) -> JobOutcome {
        info!("[Job] {} via {} -> {}", request.url, self.extractor.name(), request.output_dir.display());

        match &request.kind {
            OutputKind::Clip(_) => self.run_clip(&request).await,
            _ => self.run_standard(&request).await,
        }
    }

    fn report(&self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Finished { message, summary } => {
                info!(
                    "[Job] Done: {} converted, {} skipped, {} failed",
                    summary.converted.len(),
                    summary.skipped,
                    summary.errors
                );
                self.emitter.emit(JobEvent::Finished(message.clone()));
            }
            JobOutcome::Failed { message } => {
                error!("[Job] {}", message);
                self.emitter.emit(JobEvent::Failed(message.clone()));
            }
        }
    }

    async fn run_standard(&self, request: &JobRequest) -> JobOutcome {
        let kind = &request.kind;
        self.emitter.log("Starting download...");

        let output_template = request
            .output_dir
            .join(request.naming.output_template())
            .to_string_lossy()
            .to_string();
        self.emitter.log(format!("Output template set to: {}", output_template));

        debug!("[Job] Naming preset: {}", request.naming.label());

        let selector = FormatSelector::download_selector(kind);
        self.emitter.log(format!("Using format: {}", selector));

        let options = ExtractOptions {
            selector,
            output_template,
            playlist: request.is_batch,
            merge_container: FormatSelector::merge_container(kind).map(str::to_string),
            ignore_errors: true,
        };

        let result = match self.extractor.extract(&request.url, &options, &self.emitter).await {
            Ok(result) => result,
            Err(e) => {
                return JobOutcome::Failed {
                    message: describe_download_error(&e),
                }
            }
        };

        let mut summary = JobSummary::default();
        match result {
            DownloadResult::Nothing => self.emitter.log("No video info could be extracted."),
            DownloadResult::Single(media) => match self.convert(kind, &media).await {
                Ok(output) => summary.converted.push(output),
                Err(message) => return JobOutcome::Failed { message },
            },
            DownloadResult::Batch(entries) => {
                for (position, entry) in entries.into_iter().enumerate() {
                    match entry {
                        BatchEntry::Unavailable => {
                            debug!("[Job] Entry {} returned no data, skipping", position + 1);
                        }
                        BatchEntry::Failed(message) => self.item_failed(&message, &mut summary),
                        BatchEntry::Downloaded(media) => match self.convert(kind, &media).await {
                            Ok(output) => summary.converted.push(output),
                            Err(message) => self.item_failed(&message, &mut summary),
                        },
                    }
                }
            }
        }

        JobOutcome::Finished {
            message: FINISHED_MESSAGE.to_string(),
            summary,
        }
    }

    async fn run_clip(&self, request: &JobRequest) -> JobOutcome {
        self.emitter.log("Starting GIF creation...");
        if let OutputKind::Clip(window) = &request.kind {
            debug!("[Job] Clip window {}s..{}s", window.start(), window.end());
        }

        let temp_path = request.output_dir.join(CLIP_TEMP_NAME);
        let options = ExtractOptions {
            selector: CLIP_SOURCE_SELECTOR.to_string(),
            output_template: temp_path.to_string_lossy().to_string(),
            playlist: false,
            merge_container: Some(CLIP_SOURCE_CONTAINER.to_string()),
            ignore_errors: false,
        };

        let source = match self.extractor.extract(&request.url, &options, &self.emitter).await {
            Ok(DownloadResult::Single(media)) => media.path,
            Ok(_) if temp_path.exists() => temp_path.clone(),
            Ok(_) => {
                return JobOutcome::Failed {
                    message: "Error downloading video: No video info could be extracted.".to_string(),
                }
            }
            Err(e) => {
                self.remove_temp(&temp_path).await;
                return JobOutcome::Failed {
                    message: format!("Error downloading video: {}", describe_download_error(&e)),
                };
            }
        };
        self.emitter.log(format!("Downloaded video to {}", source.display()));

        let spec = FormatSelector::conversion_spec(&request.kind, &source);
        debug!("[Job] Clip: {}", spec.display_args());
        let result = self.transcoder.transcode(&spec).await;

        self.remove_temp(&source).await;

        match result {
            Ok(()) => {
                let message = format!("GIF saved to {}", spec.output().display());
                JobOutcome::Finished {
                    message,
                    summary: JobSummary {
                        converted: vec![spec.output],
                        ..JobSummary::default()
                    },
                }
            }
            Err(e) => JobOutcome::Failed {
                message: format!("Error creating GIF: {}", e),
            },
        }
    }

    /// Convert one file and delete the source. Err carries the message to report.
    async fn convert(&self, kind: &OutputKind, media: &MediaFile) -> Result<PathBuf, String> {
        let spec = FormatSelector::conversion_spec(kind, &media.path);
        self.emitter.log(format!("Converting: {}", media.path.display()));
        debug!("[Job] {} {}", self.transcoder.name(), spec.display_args());

        self.transcoder
            .transcode(&spec)
            .await
            .map_err(|e| format!("Error converting {}: {}", media.path.display(), e))?;

        if let Err(e) = tokio::fs::remove_file(&media.path).await {
            warn!("[Job] Could not delete {}: {}", media.path.display(), e);
        }

        self.emitter.log(format!("Saved: {}", spec.output().display()));
        Ok(spec.output)
    }

    fn item_failed(&self, message: &str, summary: &mut JobSummary) {
        if is_geo_restriction(message) {
            summary.skipped += 1;
            self.emitter.emit(JobEvent::Skipped(format!(
                "Skipping video due to geo-restriction: {}",
                message
            )));
        } else {
            summary.errors += 1;
            self.emitter.emit(JobEvent::ItemError(message.to_string()));
        }
    }

    async fn remove_temp(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => self
                .emitter
                .log(format!("Deleted temporary video file: {}", path.display())),
            Err(e) => warn!("[Job] Could not delete {}: {}", path.display(), e),
        }
    }
}

/// Error text with a short hint when the cause is recognisable
fn describe_download_error(error: &DownloadError) -> String {
    let text = error.to_string();
    match diagnose_error(&text) {
        Some(reason) if reason != BlockingReason::Unknown => {
            format!("{} ({})", text, reason.description())
        }
        _ => text,
    }
}
