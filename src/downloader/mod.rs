// Download pipeline: cookie detection, stream selection, strategy
// fallback, and output reconciliation around a narrow media-service seam.

pub mod cookies;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod selector;
pub mod traits;
pub mod ytdlp;

pub use cookies::detect_cookie_source;
pub use models::{DownloadResult, ProgressStatus, ProgressUpdate};
pub use orchestrator::Downloader;
pub use traits::{MediaService, ProgressSink};
pub use ytdlp::YtDlpService;
