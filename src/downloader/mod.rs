// Downloader module - extraction, conversion and job orchestration

pub mod backends;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use backends::FfmpegTranscoder;
pub use errors::{DownloadError, InputError, SubmitError, TranscodeError};
pub use extractors::{ExtractorConfig, ExtractorMode, YtDlpExtractor};
pub use format_selector::FormatSelector;
pub use models::{DownloadProgress, JobEvent, JobOutcome, JobRequest, NamingPreset, OutputFormat, OutputKind};
pub use orchestrator::JobRunner;
pub use tools::{ToolManager, ToolType};
pub use traits::{MediaExtractor, ProgressEmitter, Transcoder};
