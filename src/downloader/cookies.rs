// Cookie source detection
//
// Policy, first success wins:
// 1. Non-empty cookie-jar file at one of the fixed candidate locations.
// 2. First browser in DEFAULT_BROWSERS whose cookie store passes a cheap
//    validation probe against the service.
// 3. No cookies at all.
//
// Detected once per run and reused for every download attempt.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::traits::{MediaService, RequestOptions};

/// Browsers probed in preference order when no cookie file exists.
pub const DEFAULT_BROWSERS: [&str; 6] = ["edge", "chrome", "firefox", "brave", "opera", "vivaldi"];

/// Fixed cookie-jar file candidates, relative to the working directory.
const COOKIE_FILE_CANDIDATES: [&str; 3] =
    ["cookies.txt", "system/cookies.txt", "resources/cookies.txt"];

/// Stable channel listing used to validate browser cookie stores.
const COOKIE_PROBE_URL: &str = "https://www.youtube.com/@YouTube/videos";

/// Credential source attached to download attempts.
/// Closed sum type; created once per run, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    None,
    File(PathBuf),
    Browser(&'static str),
}

impl CookieSource {
    pub fn description(&self) -> String {
        match self {
            Self::None => "no cookies detected".to_string(),
            Self::File(path) => format!("cookie file: {}", path.display()),
            Self::Browser(name) => format!("browser cookies: {}", name),
        }
    }
}

fn find_cookie_file(base_dir: &Path) -> Option<PathBuf> {
    for candidate in COOKIE_FILE_CANDIDATES {
        let path = base_dir.join(candidate);
        let non_empty = path
            .metadata()
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if non_empty {
            return Some(path);
        }
    }
    None
}

async fn browser_cookies_are_valid(service: &dyn MediaService, browser: &'static str) -> bool {
    let options = RequestOptions {
        cookies: CookieSource::Browser(browser),
        player_clients: &[],
    };
    // Any probe error means "this browser failed", never fatal.
    match service.validate_cookies(COOKIE_PROBE_URL, &options).await {
        Ok(valid) => valid,
        Err(e) => {
            debug!(browser, error = %e, "browser cookie probe failed");
            false
        }
    }
}

/// Detect the credential source for this run.
pub async fn detect_cookie_source(base_dir: &Path, service: &dyn MediaService) -> CookieSource {
    if let Some(path) = find_cookie_file(base_dir) {
        info!(path = %path.display(), "using cookie file");
        return CookieSource::File(path);
    }

    for browser in DEFAULT_BROWSERS {
        debug!(browser, "probing browser cookie store");
        if browser_cookies_are_valid(service, browser).await {
            info!(browser, "using browser cookies");
            return CookieSource::Browser(browser);
        }
    }

    info!("no cookie source detected");
    CookieSource::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::DownloadError;
    use crate::downloader::models::{ProbeInfo, ServiceOutcome};
    use crate::downloader::traits::ProgressSink;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Validation outcome per browser probe, consumed in call order.
    enum Probe {
        Err,
        Invalid,
        Valid,
    }

    struct ProbingService {
        plan: Mutex<Vec<Probe>>,
        probed: Arc<Mutex<Vec<String>>>,
    }

    impl ProbingService {
        fn new(plan: Vec<Probe>) -> Self {
            Self {
                plan: Mutex::new(plan),
                probed: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl MediaService for ProbingService {
        fn name(&self) -> &'static str {
            "probing"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn probe(
            &self,
            _url: &str,
            _options: &RequestOptions,
        ) -> Result<ProbeInfo, DownloadError> {
            Ok(ProbeInfo::default())
        }

        async fn download(
            &self,
            _url: &str,
            _options: &RequestOptions,
            _format_expr: &str,
            _progress: &dyn ProgressSink,
        ) -> Result<ServiceOutcome, DownloadError> {
            Err(DownloadError::Unknown("not scripted".to_string()))
        }

        async fn validate_cookies(
            &self,
            _listing_url: &str,
            options: &RequestOptions,
        ) -> Result<bool, DownloadError> {
            if let CookieSource::Browser(name) = &options.cookies {
                self.probed.lock().unwrap().push(name.to_string());
            }
            let mut plan = self.plan.lock().unwrap();
            match if plan.is_empty() { Probe::Err } else { plan.remove(0) } {
                Probe::Err => Err(DownloadError::Unknown("browser store locked".to_string())),
                Probe::Invalid => Ok(false),
                Probe::Valid => Ok(true),
            }
        }
    }

    #[tokio::test]
    async fn test_first_valid_browser_wins_and_probe_errors_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let service = ProbingService::new(vec![Probe::Err, Probe::Invalid, Probe::Valid]);
        let probed = service.probed.clone();

        let source = detect_cookie_source(dir.path(), &service).await;

        assert_eq!(source, CookieSource::Browser("firefox"));
        assert_eq!(*probed.lock().unwrap(), vec!["edge", "chrome", "firefox"]);
    }

    #[tokio::test]
    async fn test_all_browsers_failing_falls_through_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let service = ProbingService::new(Vec::new());
        let probed = service.probed.clone();

        let source = detect_cookie_source(dir.path(), &service).await;

        assert_eq!(source, CookieSource::None);
        assert_eq!(probed.lock().unwrap().len(), DEFAULT_BROWSERS.len());
    }

    #[tokio::test]
    async fn test_cookie_file_short_circuits_browser_probing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cookies.txt"), b"# Netscape HTTP Cookie File\n")
            .unwrap();
        let service = ProbingService::new(vec![Probe::Valid]);
        let probed = service.probed.clone();

        let source = detect_cookie_source(dir.path(), &service).await;

        assert_eq!(source, CookieSource::File(dir.path().join("cookies.txt")));
        assert!(probed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_find_cookie_file_prefers_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("system")).unwrap();
        std::fs::write(dir.path().join("cookies.txt"), b"# Netscape HTTP Cookie File\n")
            .unwrap();
        std::fs::write(dir.path().join("system/cookies.txt"), b"other\n").unwrap();

        let found = find_cookie_file(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("cookies.txt"));
    }

    #[test]
    fn test_find_cookie_file_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cookies.txt"), b"").unwrap();
        assert!(find_cookie_file(dir.path()).is_none());
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(CookieSource::None.description(), "no cookies detected");
        assert_eq!(
            CookieSource::Browser("chrome").description(),
            "browser cookies: chrome"
        );
        assert!(CookieSource::File(PathBuf::from("cookies.txt"))
            .description()
            .starts_with("cookie file: "));
    }
}
