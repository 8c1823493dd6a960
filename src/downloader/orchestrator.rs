// Download orchestration with strategy fallback
//
// One video is driven through a fixed, ordered list of strategies until a
// strategy yields a validated output file. Strategies run strictly in
// order and never in parallel: looser strategies are only attempted after
// the stricter ones demonstrably failed. No failure inside a strategy is
// fatal to the video, and no video failure is fatal to the run.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::cookies::CookieSource;
use super::errors::{summarize_error, DownloadError};
use super::models::DownloadResult;
use super::output::{resolve_output, snapshot_output_dir};
use super::selector::{Selection, StreamSelector};
use super::traits::{MediaService, ProgressSink, RequestOptions};

/// One (credential policy, client-identity hint) pairing attempted as a
/// unit. The table below is process-wide static configuration.
#[derive(Debug, Clone, Copy)]
pub struct DownloadStrategy {
    pub name: &'static str,
    pub use_cookies: bool,
    pub player_clients: &'static [&'static str],
}

pub const DOWNLOAD_STRATEGIES: [DownloadStrategy; 4] = [
    DownloadStrategy {
        name: "cookies-desktop-clients",
        use_cookies: true,
        player_clients: &["tv_downgraded", "web", "web_safari"],
    },
    DownloadStrategy {
        name: "cookies-mobile-clients",
        use_cookies: true,
        player_clients: &["ios_downgraded", "android_vr", "web"],
    },
    DownloadStrategy {
        name: "no-cookies-mobile",
        use_cookies: false,
        player_clients: &["ios_downgraded", "android_vr"],
    },
    DownloadStrategy {
        name: "no-cookies-default",
        use_cookies: false,
        player_clients: &["android", "web"],
    },
];

/// Files below this size are treated as corrupt and deleted.
const MIN_OUTPUT_BYTES: u64 = 10_000;

pub struct Downloader {
    service: Box<dyn MediaService>,
    output_dir: PathBuf,
}

impl Downloader {
    pub fn new(service: Box<dyn MediaService>, output_dir: PathBuf) -> Self {
        Self {
            service,
            output_dir,
        }
    }

    fn request_options(
        strategy: &DownloadStrategy,
        cookie_source: &CookieSource,
    ) -> RequestOptions {
        RequestOptions {
            // All-or-nothing per strategy: the detected source whole, or
            // no credentials at all.
            cookies: if strategy.use_cookies {
                cookie_source.clone()
            } else {
                CookieSource::None
            },
            player_clients: strategy.player_clients,
        }
    }

    /// Run the full strategy ladder for one URL.
    pub async fn download_one(
        &self,
        url: &str,
        cookie_source: &CookieSource,
        progress: &dyn ProgressSink,
    ) -> DownloadResult {
        let mut last_error = "unknown download error".to_string();

        for strategy in &DOWNLOAD_STRATEGIES {
            let before = snapshot_output_dir(&self.output_dir);
            let options = Self::request_options(strategy, cookie_source);

            // Probe failure is not fatal to the strategy; fall back to the
            // generic expression and keep going.
            let (selection, probe_title) = match self.service.probe(url, &options).await {
                Ok(probe) => {
                    debug!(
                        video = probe.id.as_deref().unwrap_or("?"),
                        formats = probe.formats.len(),
                        "probe succeeded"
                    );
                    (StreamSelector::choose(&probe.formats), probe.title)
                }
                Err(e) => {
                    last_error =
                        format!("format probe failed: {}", summarize_error(&e.to_string()));
                    warn!(strategy = strategy.name, error = %last_error, "probe failed");
                    (Selection::generic_best(), None)
                }
            };

            let strategy_label = format!("{} | {}", strategy.name, selection.label);
            info!(
                url,
                service = self.service.name(),
                strategy = %strategy_label,
                format = %selection.expression,
                "starting attempt"
            );

            let outcome = match self
                .service
                .download(url, &options, &selection.expression, progress)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    last_error = summarize_error(&e.to_string());
                    warn!(strategy = strategy.name, error = %last_error, "attempt failed");
                    continue;
                }
            };

            let Some(output_file) = resolve_output(&self.output_dir, &before, &outcome) else {
                last_error = DownloadError::NoOutputFile.to_string();
                warn!(strategy = strategy.name, "no output file after download");
                continue;
            };

            let size = output_file.metadata().map(|m| m.len()).unwrap_or(0);
            if size < MIN_OUTPUT_BYTES {
                let name = output_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                last_error = DownloadError::FileTooSmall(name).to_string();
                warn!(strategy = strategy.name, size, "undersized output removed");
                let _ = std::fs::remove_file(&output_file);
                continue;
            }

            let title = outcome
                .title
                .or(probe_title)
                .unwrap_or_else(|| {
                    output_file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });

            info!(url, file = %output_file.display(), strategy = %strategy_label, "download succeeded");
            return DownloadResult {
                url: url.to_string(),
                success: true,
                title,
                output_file: Some(output_file),
                strategy: strategy_label,
                error: String::new(),
            };
        }

        DownloadResult::failed(url, last_error)
    }
}
