// Extractor module - everything that talks to yt-dlp
//
// Two launch modes share one implementation:
// - CLI mode: native `yt-dlp` binary
// - Python mode: `python3 -m yt_dlp`
// Auto mode picks the binary when it can be found, else the module.

mod cli;
mod diagnostics;
pub mod python;
mod traits;

pub use cli::{Launcher, YtDlpExtractor};
pub use diagnostics::{diagnose_error, is_geo_restriction, BlockingReason};
pub use traits::{ExtractOptions, ExtractorConfig, ExtractorMode};
