// Media service seam
//
// The external extraction/download service is reached through this narrow
// capability interface: probe (metadata only), download (with progress
// callbacks), and a cheap cookie validation call. Backends other than
// yt-dlp can slot in without touching the orchestrator.

use async_trait::async_trait;

use super::cookies::CookieSource;
use super::errors::DownloadError;
use super::models::{ProbeInfo, ProgressUpdate, ServiceOutcome};

/// Options attached to a single service call. Cookie application is
/// all-or-nothing per strategy: either the detected source goes in whole,
/// or `CookieSource::None` does.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub cookies: CookieSource,
    /// Client-identity hints, in preference order. Empty means the
    /// service default.
    pub player_clients: &'static [&'static str],
}

/// Synchronous delivery of status events during a blocking download.
/// In-progress events precede the terminal finished event; no other
/// ordering is guaranteed.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: ProgressUpdate);
}

/// Sink for probes and tests that ignore progress.
#[allow(dead_code)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _update: ProgressUpdate) {}
}

#[async_trait]
pub trait MediaService: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Whether the backing tool is installed and runnable
    fn is_available(&self) -> bool;

    /// Fetch structured metadata for one video without downloading.
    async fn probe(&self, url: &str, options: &RequestOptions)
        -> Result<ProbeInfo, DownloadError>;

    /// Download one video using the given format expression.
    async fn download(
        &self,
        url: &str,
        options: &RequestOptions,
        format_expr: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ServiceOutcome, DownloadError>;

    /// Flat listing probe: does this credential source produce at least
    /// one entry for the given listing URL?
    async fn validate_cookies(
        &self,
        listing_url: &str,
        options: &RequestOptions,
    ) -> Result<bool, DownloadError>;
}
