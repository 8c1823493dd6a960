// yt-dlp backend for the MediaService seam
//
// Shells out to the yt-dlp binary. Probes run the process to completion
// under a timeout and parse `--dump-json` output; downloads stream stdout
// line-by-line, turning `--newline` progress lines into ProgressUpdate
// events and collecting the file paths yt-dlp prints after each move.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::cookies::CookieSource;
use super::errors::DownloadError;
use super::models::{ProbeInfo, ProgressStatus, ProgressUpdate, ServiceOutcome};
use super::traits::{MediaService, ProgressSink, RequestOptions};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) \
    Chrome/131.0.0.0 Safari/537.36";

const PROBE_TIMEOUT_SECS: u64 = 60;
const COOKIE_PROBE_TIMEOUT_SECS: u64 = 30;

/// Tagged `--print` templates so file paths and titles can be told apart
/// from progress output on the same stream.
const PRINT_FILEPATH: &str = "after_move:OUT:%(filepath)s";
const PRINT_TITLE: &str = "after_move:TITLE:%(title)s";

lazy_static! {
    // [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32
    static ref PROGRESS_RE: Regex = Regex::new(
        r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)\s+at\s+(\S+)(?:\s+ETA\s+(\S+))?"
    )
    .unwrap();
    static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
    static ref SIZE_RE: Regex = Regex::new(r"^(\d+\.?\d*)\s*([KMGT]?i?B)$").unwrap();
}

/// Parse a human size like "343.72MiB" into bytes.
fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(text.trim())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier: f64 = match caps.get(2)?.as_str() {
        "B" => 1.0,
        "KiB" | "KB" => 1024.0,
        "MiB" | "MB" => 1024.0 * 1024.0,
        "GiB" | "GB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" | "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

/// Parse one yt-dlp stdout line into a progress event.
fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let total = caps.get(2).and_then(|m| parse_size(m.as_str()));
        let downloaded = total.map(|t| ((t as f64) * (percent as f64) / 100.0) as u64);
        return Some(ProgressUpdate {
            status: ProgressStatus::InProgress,
            percent: Some(percent),
            downloaded_bytes: downloaded,
            total_bytes: total,
            rate: caps.get(3).map(|m| m.as_str().to_string()),
            eta: caps.get(4).map(|m| m.as_str().to_string()),
        });
    }

    if MERGE_RE.is_match(line) || line.contains("has already been downloaded") {
        return Some(ProgressUpdate::finished());
    }

    None
}

/// Pick the most useful line out of yt-dlp stderr.
fn extract_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.contains("ERROR"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("yt-dlp failed without error output")
        .trim()
        .to_string()
}

pub struct YtDlpService {
    binary: String,
    output_dir: PathBuf,
}

impl YtDlpService {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            binary: Self::find_ytdlp(),
            output_dir,
        }
    }

    /// Find the yt-dlp binary across common install paths, then PATH.
    fn find_ytdlp() -> String {
        let common_paths = [
            "/opt/homebrew/bin/yt-dlp",
            "/usr/local/bin/yt-dlp",
            "/usr/bin/yt-dlp",
        ];
        for path in common_paths {
            if Path::new(path).exists() {
                return path.to_string();
            }
        }
        "yt-dlp".to_string()
    }

    fn cookie_args(cookies: &CookieSource) -> Vec<String> {
        match cookies {
            CookieSource::None => Vec::new(),
            CookieSource::File(path) => {
                vec!["--cookies".to_string(), path.to_string_lossy().into_owned()]
            }
            CookieSource::Browser(name) => {
                vec!["--cookies-from-browser".to_string(), name.to_string()]
            }
        }
    }

    /// Options shared by every invocation.
    fn base_args(options: &RequestOptions) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--ignore-config".to_string(),
            "--socket-timeout".to_string(),
            "60".to_string(),
            "--user-agent".to_string(),
            USER_AGENT.to_string(),
            "--add-header".to_string(),
            "Accept-Language:en-us,en;q=0.5".to_string(),
        ];
        if !options.player_clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!(
                "youtube:player_client={}",
                options.player_clients.join(",")
            ));
        }
        args.extend(Self::cookie_args(&options.cookies));
        args
    }

    fn download_args(&self, url: &str, options: &RequestOptions, format_expr: &str) -> Vec<String> {
        let mut args = Self::base_args(options);
        args.extend([
            "-f".to_string(),
            format_expr.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--recode-video".to_string(),
            "mp4".to_string(),
            "-P".to_string(),
            self.output_dir.to_string_lossy().into_owned(),
            "-o".to_string(),
            "%(title).200B.%(ext)s".to_string(),
            "--retries".to_string(),
            "15".to_string(),
            "--fragment-retries".to_string(),
            "15".to_string(),
            "--skip-unavailable-fragments".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--print".to_string(),
            PRINT_FILEPATH.to_string(),
            "--print".to_string(),
            PRINT_TITLE.to_string(),
        ]);
        args.push(url.to_string());
        args
    }

    /// Run to completion with a hard timeout; the child is killed when the
    /// deadline passes.
    async fn run_with_timeout(
        &self,
        args: Vec<String>,
        timeout_secs: u64,
    ) -> Result<std::process::Output, DownloadError> {
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DownloadError::ToolNotFound(format!("failed to start {}: {}", self.binary, e))
            })?;

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("no stdout pipe".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("no stderr pipe".to_string()))?;

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| DownloadError::ExecutionError(format!("wait failed: {}", e)))?;
                let stdout = stdout_task.await.unwrap_or_default();
                let stderr = stderr_task.await.unwrap_or_default();
                Ok(std::process::Output {
                    status,
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                Err(DownloadError::NetworkTimeout)
            }
        }
    }
}

#[async_trait]
impl MediaService for YtDlpService {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn probe(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ProbeInfo, DownloadError> {
        let mut args = Self::base_args(options);
        args.extend([
            "--dump-json".to_string(),
            "--skip-download".to_string(),
        ]);
        args.push(url.to_string());

        debug!(url, "probing formats");
        let output = self.run_with_timeout(args, PROBE_TIMEOUT_SECS).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from(extract_error_line(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim())
            .map_err(|e| DownloadError::ParseError(format!("invalid probe JSON: {}", e)))
    }

    async fn download(
        &self,
        url: &str,
        options: &RequestOptions,
        format_expr: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ServiceOutcome, DownloadError> {
        let args = self.download_args(url, options, format_expr);
        debug!(url, format = format_expr, "starting yt-dlp download");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DownloadError::ToolNotFound(format!("failed to start {}: {}", self.binary, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("no stdout pipe".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("no stderr pipe".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        let mut outcome = ServiceOutcome::default();
        let mut lines = BufReader::new(stdout).lines();
        let mut saw_progress = false;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(path) = line.strip_prefix("OUT:") {
                outcome.reported_paths.push(PathBuf::from(path.trim()));
                continue;
            }
            if let Some(title) = line.strip_prefix("TITLE:") {
                let title = title.trim();
                if !title.is_empty() {
                    outcome.title = Some(title.to_string());
                }
                continue;
            }
            if let Some(update) = parse_progress_line(&line) {
                saw_progress = true;
                progress.update(update);
            }
        }

        // No outer timeout here: the full download is unbounded by design,
        // governed by yt-dlp's own retry and socket-timeout flags.
        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("wait failed: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            warn!(url, "yt-dlp exited with failure");
            return Err(DownloadError::from(extract_error_line(&stderr)));
        }

        if saw_progress {
            progress.update(ProgressUpdate::finished());
        }
        Ok(outcome)
    }

    async fn validate_cookies(
        &self,
        listing_url: &str,
        options: &RequestOptions,
    ) -> Result<bool, DownloadError> {
        let mut args = Self::cookie_args(&options.cookies);
        args.extend([
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--flat-playlist".to_string(),
            "--playlist-items".to_string(),
            "1".to_string(),
            "--ignore-errors".to_string(),
            "--no-warnings".to_string(),
            "--ignore-config".to_string(),
        ]);
        args.push(listing_url.to_string());

        let output = self
            .run_with_timeout(args, COOKIE_PROBE_TIMEOUT_SECS)
            .await?;
        if !output.status.success() {
            return Ok(false);
        }

        // One JSON object per flat entry; any entry with an id validates
        // the cookie source.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let has_entry = stdout.lines().any(|line| {
            serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .map_or(false, |v| v.get("id").is_some())
        });
        Ok(has_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        let line = "[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32";
        let update = parse_progress_line(line).unwrap();
        assert_eq!(update.status, ProgressStatus::InProgress);
        assert_eq!(update.percent, Some(6.2));
        assert_eq!(update.rate.as_deref(), Some("420.30KiB/s"));
        assert_eq!(update.eta.as_deref(), Some("12:32"));
        assert!(update.total_bytes.unwrap() > 300 * 1024 * 1024);
        assert!(update.downloaded_bytes.unwrap() < update.total_bytes.unwrap());
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("OUT:/tmp/video.mp4").is_none());
    }

    #[test]
    fn test_merge_line_maps_to_finished() {
        let line = "[Merger] Merging formats into \"output/video.mp4\"";
        let update = parse_progress_line(line).unwrap();
        assert_eq!(update.status, ProgressStatus::Finished);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("1.5KiB"), Some(1536));
        assert_eq!(parse_size("2MiB"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("garbage"), None);
    }

    #[test]
    fn test_extract_error_line_prefers_error_marker() {
        let stderr = "WARNING: slow\nERROR: [youtube] abc: Sign in to confirm\ntrailing";
        assert_eq!(
            extract_error_line(stderr),
            "ERROR: [youtube] abc: Sign in to confirm"
        );
    }

    #[test]
    fn test_cookie_args_per_source() {
        assert!(YtDlpService::cookie_args(&CookieSource::None).is_empty());
        assert_eq!(
            YtDlpService::cookie_args(&CookieSource::Browser("firefox")),
            vec!["--cookies-from-browser", "firefox"]
        );
        assert_eq!(
            YtDlpService::cookie_args(&CookieSource::File("cookies.txt".into())),
            vec!["--cookies", "cookies.txt"]
        );
    }
}
