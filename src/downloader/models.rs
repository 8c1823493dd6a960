// Common data models for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

/// One entry of the `formats` array reported by yt-dlp.
/// Ephemeral: lives only while the selector ranks streams for one video.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatDescriptor {
    /// Format ID (e.g., "137", "140"); absent entries are unusable
    pub format_id: Option<String>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
    /// Video bitrate in kbps
    pub vbr: Option<f64>,
    /// File size in bytes; approximate values arrive as floats
    pub filesize: Option<f64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<f64>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// Whether the stream is DRM-protected; the service may report
    /// true/false or the string "maybe"
    #[serde(deserialize_with = "truthy_drm_flag")]
    pub has_drm: bool,
}

fn truthy_drm_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

impl FormatDescriptor {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v != "none" && !v.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref().map_or(false, |a| a != "none" && !a.is_empty())
    }

    /// Exact file size when known, approximate otherwise
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx).map(|v| v as u64)
    }
}

/// Metadata returned by a probe (no media bytes fetched).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProbeInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub formats: Vec<FormatDescriptor>,
}

/// Structured result of a completed download call.
#[derive(Debug, Clone, Default)]
pub struct ServiceOutcome {
    /// Title reported by the service, when it printed one
    pub title: Option<String>,
    /// Best-effort output file paths reported by the service,
    /// including per-sub-download entries
    pub reported_paths: Vec<PathBuf>,
}

/// Terminal outcome for one input URL. Immutable once created;
/// aggregated into the final report.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub url: String,
    pub success: bool,
    pub title: String,
    pub output_file: Option<PathBuf>,
    /// Which strategy+format label succeeded, or "all strategies failed"
    pub strategy: String,
    pub error: String,
}

impl DownloadResult {
    pub fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            title: String::new(),
            output_file: None,
            strategy: "all strategies failed".to_string(),
            error,
        }
    }
}

/// Transfer state reported through a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// Media bytes are still being transferred
    InProgress,
    /// Transfer done; the service may still be merging containers
    Finished,
}

/// One progress event, delivered synchronously during a blocking download.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    /// Completion in percent, when the service reports one
    pub percent: Option<f32>,
    pub downloaded_bytes: Option<u64>,
    /// Total bytes, possibly unknown for live or fragmented streams
    pub total_bytes: Option<u64>,
    /// Transfer rate as reported (e.g. "420.30KiB/s")
    pub rate: Option<String>,
    /// Estimated time remaining as reported (e.g. "12:32")
    pub eta: Option<String>,
}

impl ProgressUpdate {
    pub fn finished() -> Self {
        Self {
            status: ProgressStatus::Finished,
            percent: Some(100.0),
            downloaded_bytes: None,
            total_bytes: None,
            rate: None,
            eta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_info_from_ytdlp_json() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Some Video",
            "uploader": "Someone",
            "formats": [
                {"format_id": "137", "height": 1080, "fps": 30, "vcodec": "avc1", "acodec": "none",
                 "filesize_approx": 123456.7, "has_drm": false},
                {"format_id": "dash-1", "height": 2160, "vcodec": "vp9", "acodec": "none",
                 "has_drm": "maybe"},
                {"format_id": "18", "height": 360, "vcodec": "avc1", "acodec": "mp4a",
                 "filesize": 9999}
            ]
        }"#;

        let info: ProbeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(info.formats.len(), 3);
        assert_eq!(info.formats[0].effective_size(), Some(123456));
        assert!(!info.formats[0].has_drm);
        assert!(info.formats[1].has_drm);
        assert!(info.formats[2].has_video() && info.formats[2].has_audio());
    }

    #[test]
    fn test_missing_fields_default() {
        let fmt: FormatDescriptor = serde_json::from_str(r#"{"format_id": "140"}"#).unwrap();
        assert!(!fmt.has_video());
        assert!(!fmt.has_audio());
        assert_eq!(fmt.effective_size(), None);
        assert!(!fmt.has_drm);
    }
}
