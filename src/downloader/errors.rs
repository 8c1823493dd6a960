// Error types for the download pipeline

use std::fmt;

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// Network timeout while talking to YouTube
    NetworkTimeout,

    /// YouTube refused the request (429, bot detection, etc.)
    BlockedByYouTube,

    /// yt-dlp binary not found in system
    ToolNotFound(String),

    /// Invalid YouTube URL format
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    ParseError(String),

    /// Subprocess failed to start or exited abnormally
    ExecutionError(String),

    /// Service finished but no output file was created
    NoOutputFile,

    /// Downloaded file was below the corruption floor
    FileTooSmall(String),

    /// Unknown error with details
    Unknown(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkTimeout => write!(f, "Network timeout: YouTube is not responding"),
            Self::BlockedByYouTube => {
                write!(f, "YouTube is throttling or blocking requests from this address")
            }
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            Self::NoOutputFile => {
                write!(f, "yt-dlp finished but no output file was created")
            }
            Self::FileTooSmall(name) => write!(f, "downloaded file was too small: {}", name),
            Self::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        // Classify raw subprocess/stderr text into the taxonomy above.

        if (s.contains("timeout") || s.contains("timed out")) && s.contains("youtube.com") {
            return Self::BlockedByYouTube;
        }

        if s.contains("timeout") || s.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if s.contains("429") || s.contains("bot") || s.contains("blocked") {
            return Self::BlockedByYouTube;
        }

        if s.contains("not found") || s.contains("No such file") || s.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        if s.contains("parse") || s.contains("JSON") || s.contains("Invalid JSON") {
            return Self::ParseError(s);
        }

        if s.contains("Invalid URL") || s.contains("Unsupported URL") {
            return Self::InvalidUrl(s);
        }

        Self::Unknown(s)
    }
}

/// Single-line, length-bounded error summary for batch output.
/// Takes the first line of the error text, capped at 180 characters.
pub fn summarize_error(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return "unknown download error".to_string();
    }
    if first_line.chars().count() > 180 {
        let head: String = first_line.chars().take(177).collect();
        return format!("{}...", head);
    }
    first_line.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_takes_first_line() {
        let text = "ERROR: fragment 3 not found\nTraceback (most recent call last):\n  ...";
        assert_eq!(summarize_error(text), "ERROR: fragment 3 not found");
    }

    #[test]
    fn test_summarize_caps_length() {
        let long = "x".repeat(400);
        let summary = summarize_error(&long);
        assert_eq!(summary.chars().count(), 180);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summarize_empty_text() {
        assert_eq!(summarize_error("   \n"), "unknown download error");
    }

    #[test]
    fn test_classify_timeout() {
        let err = DownloadError::from("Connection timed out".to_string());
        assert!(matches!(err, DownloadError::NetworkTimeout));
    }

    #[test]
    fn test_classify_blocked() {
        let err = DownloadError::from("HTTP Error 429: Too Many Requests".to_string());
        assert!(matches!(err, DownloadError::BlockedByYouTube));
    }
}
