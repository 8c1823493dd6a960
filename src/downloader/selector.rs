// Stream selection
//
// Picks the best video/audio pairing from the formats a probe reported.
// Video-only streams (separate merge) are preferred over progressive ones:
// their quality ceiling is higher. The returned expression is always a
// fallback chain, never a bare ID on its own, because exact stream IDs can
// vanish between probing and downloading.

use super::models::FormatDescriptor;

/// Generic best-effort request used when nothing usable was reported.
pub const GENERIC_BEST_FORMAT: &str = "bestvideo*+bestaudio/bestvideo+bestaudio/best";

/// Label paired with the generic expression.
pub const GENERIC_BEST_LABEL: &str = "generic-best";

/// A chosen format-request expression plus a human label.
///
/// `expression` is a fallback chain in the backend's format-selection
/// syntax; only the fallback order (exact match, then closest equivalent,
/// then generic best) is a contract across backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub expression: String,
    pub label: String,
}

impl Selection {
    pub fn generic_best() -> Self {
        Self {
            expression: GENERIC_BEST_FORMAT.to_string(),
            label: GENERIC_BEST_LABEL.to_string(),
        }
    }
}

pub struct StreamSelector;

impl StreamSelector {
    /// Choose the download format for one video.
    pub fn choose(formats: &[FormatDescriptor]) -> Selection {
        let usable: Vec<&FormatDescriptor> = formats
            .iter()
            .filter(|f| f.format_id.as_deref().map_or(false, |id| !id.is_empty()))
            .filter(|f| !f.has_drm)
            .collect();

        let video_only: Vec<&FormatDescriptor> = usable
            .iter()
            .copied()
            .filter(|f| f.has_video() && !f.has_audio())
            .collect();
        let progressive: Vec<&FormatDescriptor> = usable
            .iter()
            .copied()
            .filter(|f| f.has_video() && f.has_audio())
            .collect();

        if let Some(best) = video_only.iter().max_by_key(|f| Self::sort_key(f)) {
            let id = best.format_id.as_deref().unwrap_or_default();
            let height = best.height.unwrap_or(0);
            return Selection {
                expression: format!(
                    "{id}+bestaudio[acodec!=none]/{id}+bestaudio/{id}/best"
                ),
                label: format!("video-only {}p", height),
            };
        }

        if let Some(best) = progressive.iter().max_by_key(|f| Self::sort_key(f)) {
            let id = best.format_id.as_deref().unwrap_or_default();
            let height = best.height.unwrap_or(0);
            return Selection {
                // Already carries audio, no merge pairing needed
                expression: id.to_string(),
                label: format!("progressive {}p", height),
            };
        }

        Selection::generic_best()
    }

    /// Lexicographic ranking tuple; absent fields coerce to zero.
    /// Fractional fps/bitrate values are scaled to keep ordering in
    /// integer space.
    fn sort_key(f: &FormatDescriptor) -> (u32, u64, u64, u64) {
        let fps = f.fps.map(|v| (v * 1000.0) as u64).unwrap_or(0);
        let bitrate = f
            .tbr
            .or(f.vbr)
            .map(|v| (v * 1000.0) as u64)
            .unwrap_or(0);
        (
            f.height.unwrap_or(0),
            fps,
            bitrate,
            f.effective_size().unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_only(id: &str, height: u32, fps: f64) -> FormatDescriptor {
        FormatDescriptor {
            format_id: Some(id.to_string()),
            height: Some(height),
            fps: Some(fps),
            vcodec: Some("avc1.4d401f".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        }
    }

    fn progressive(id: &str, height: u32) -> FormatDescriptor {
        FormatDescriptor {
            format_id: Some(id.to_string()),
            height: Some(height),
            fps: Some(30.0),
            vcodec: Some("avc1.4d401e".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_video_only_preferred_over_progressive() {
        let formats = vec![video_only("137", 1080, 30.0), progressive("18", 480)];
        let selection = StreamSelector::choose(&formats);
        assert_eq!(selection.label, "video-only 1080p");
        assert_eq!(
            selection.expression,
            "137+bestaudio[acodec!=none]/137+bestaudio/137/best"
        );
    }

    #[test]
    fn test_progressive_only_returns_bare_id() {
        let formats = vec![progressive("22", 720)];
        let selection = StreamSelector::choose(&formats);
        assert_eq!(selection.label, "progressive 720p");
        assert_eq!(selection.expression, "22");
    }

    #[test]
    fn test_empty_input_returns_generic_best() {
        let selection = StreamSelector::choose(&[]);
        assert_eq!(selection.label, GENERIC_BEST_LABEL);
        assert_eq!(selection.expression, GENERIC_BEST_FORMAT);
    }

    #[test]
    fn test_drm_and_idless_entries_never_selected() {
        let mut drm = video_only("614", 2160, 60.0);
        drm.has_drm = true;
        let mut idless = video_only("", 1440, 60.0);
        idless.format_id = None;

        let formats = vec![drm, idless, video_only("137", 1080, 30.0)];
        let selection = StreamSelector::choose(&formats);
        assert_eq!(selection.label, "video-only 1080p");
    }

    #[test]
    fn test_ranking_breaks_height_ties_by_fps() {
        let formats = vec![video_only("hi60", 1080, 60.0), video_only("hi30", 1080, 30.0)];
        let selection = StreamSelector::choose(&formats);
        assert!(selection.expression.starts_with("hi60+"));
    }

    #[test]
    fn test_absent_fields_rank_as_zero_instead_of_erroring() {
        let bare = FormatDescriptor {
            format_id: Some("x".to_string()),
            vcodec: Some("vp9".to_string()),
            acodec: Some("none".to_string()),
            ..Default::default()
        };
        let formats = vec![bare, video_only("137", 1080, 30.0)];
        let selection = StreamSelector::choose(&formats);
        assert_eq!(selection.label, "video-only 1080p");
    }
}
