// URL canonicalization
//
// Turns loosely formatted user input into canonical watch URLs. Two raw
// inputs naming the same 11-character video id always normalize to the
// same string, which doubles as the dedup key.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

fn canonical(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

fn strip_wrappers(token: &str) -> &str {
    token
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | ',' | '<' | '>' | '[' | ']' | '(' | ')' | '{' | '}'))
        .trim()
}

/// Split a URL that already carries a scheme into (host, path, query).
fn split_url(value: &str) -> Option<(String, String, String)> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))?;
    let (host_part, path_query) = match rest.split_once('/') {
        Some((host, tail)) => (host, format!("/{}", tail)),
        None => (rest, String::new()),
    };
    // Drop any port; userinfo does not occur in these URLs.
    let host = host_part
        .split(':')
        .next()
        .unwrap_or(host_part)
        .to_lowercase();
    let (path, query) = match path_query.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (path_query, String::new()),
    };
    Some((host, path, query))
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Normalize one raw token into the canonical watch URL, or None when the
/// token does not name a video. Not an error: callers filter these out.
pub fn normalize_video_url(raw: &str) -> Option<String> {
    let value = strip_wrappers(raw);
    if value.is_empty() {
        return None;
    }

    // Bare 11-character video id
    if VIDEO_ID_RE.is_match(value) {
        return Some(canonical(value));
    }

    // Scheme-less link shapes get a scheme before parsing
    let with_scheme = if value.starts_with("youtube.com/")
        || value.starts_with("www.youtube.com/")
        || value.starts_with("youtu.be/")
    {
        format!("https://{}", value)
    } else {
        value.to_string()
    };

    let (host, path, query) = split_url(&with_scheme)?;

    if host.contains("youtu.be") {
        let candidate = path.trim_matches('/').split('/').next().unwrap_or("");
        return VIDEO_ID_RE.is_match(candidate).then(|| canonical(candidate));
    }

    if host.contains("youtube.com") {
        if path == "/watch" {
            let candidate = query_param(&query, "v")?;
            return VIDEO_ID_RE.is_match(candidate).then(|| canonical(candidate));
        }

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() >= 2 && matches!(parts[0], "shorts" | "embed" | "live") {
            let candidate = parts[1];
            return VIDEO_ID_RE.is_match(candidate).then(|| canonical(candidate));
        }
    }

    None
}

/// Extract every canonical URL from free-form text: split on whitespace
/// and commas, normalize each token, dedup preserving first-seen order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        let Some(url) = normalize_video_url(token) else {
            continue;
        };
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_equivalent_shapes_normalize_identically() {
        let expected = format!("https://www.youtube.com/watch?v={}", ID);
        for raw in [
            format!("https://www.youtube.com/watch?v={}", ID),
            format!("https://youtu.be/{}", ID),
            ID.to_string(),
            format!("youtube.com/watch?v={}", ID),
            format!("https://www.youtube.com/shorts/{}", ID),
            format!("https://www.youtube.com/embed/{}", ID),
            format!("https://www.youtube.com/live/{}", ID),
            format!("\"https://youtu.be/{}\"", ID),
        ] {
            assert_eq!(normalize_video_url(&raw).as_deref(), Some(expected.as_str()), "{raw}");
        }
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_video_url(ID).unwrap();
        assert_eq!(normalize_video_url(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn test_watch_url_with_extra_query_params() {
        let raw = format!("https://www.youtube.com/watch?list=PL123&v={}&t=42s", ID);
        assert!(normalize_video_url(&raw).is_some());
    }

    #[test]
    fn test_rejects_non_video_shapes() {
        for raw in [
            "",
            "shortid",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/@YouTube/videos",
            "https://www.youtube.com/watch",
            "https://youtu.be/",
            "not a url at all",
        ] {
            assert_eq!(normalize_video_url(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_extract_dedups_preserving_order() {
        let text = format!("{id}, https://youtu.be/{id}\nabcdefghij_ {id}", id = ID);
        let urls = extract_urls(&text);
        assert_eq!(
            urls,
            vec![
                format!("https://www.youtube.com/watch?v={}", ID),
                "https://www.youtube.com/watch?v=abcdefghij_".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_skips_invalid_tokens() {
        let urls = extract_urls("hello,, world https://example.com/x");
        assert!(urls.is_empty());
    }
}
