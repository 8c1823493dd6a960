// Output reconciliation
//
// The output directory may hold unrelated files from previous runs, so a
// download attempt is attributed to a file by diffing directory snapshots
// taken before and after the attempt. When the diff finds nothing, the
// paths the service itself reported are inspected as a fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::models::ServiceOutcome;

/// Container extensions accepted as final video output.
const VALID_VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", "mov"];

/// Incomplete-download sidecars, excluded even if matched.
const SIDECAR_EXTENSIONS: [&str; 2] = ["part", "ytdl"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

fn is_video_file(path: &Path) -> bool {
    match extension_of(path) {
        Some(ext) => {
            VALID_VIDEO_EXTENSIONS.contains(&ext.as_str())
                && !SIDECAR_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Map of resolved file path to size for every file in the output dir.
pub fn snapshot_output_dir(dir: &Path) -> HashMap<PathBuf, u64> {
    let mut snapshot = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return snapshot;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let resolved = path.canonicalize().unwrap_or(path);
        snapshot.insert(resolved, meta.len());
    }
    snapshot
}

/// Video files created or resized since `before`, most recently
/// modified first.
pub fn find_new_video_files(dir: &Path, before: &HashMap<PathBuf, u64>) -> Vec<PathBuf> {
    let mut created: Vec<(PathBuf, SystemTime)> = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() || !is_video_file(&path) {
            continue;
        }

        let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
        let size = meta.len();
        let is_new = match before.get(&resolved) {
            Some(old_size) => *old_size != size,
            None => true,
        };
        if is_new {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            created.push((path, mtime));
        }
    }

    created.sort_by(|a, b| b.1.cmp(&a.1));
    created.into_iter().map(|(path, _)| path).collect()
}

/// Fallback attribution from the paths the service reported. Each
/// candidate is also tried with its extension swapped to .mp4 and
/// relocated into the output directory, since the service may have
/// remuxed or moved the file after reporting.
pub fn resolve_from_outcome(dir: &Path, outcome: &ServiceOutcome) -> Option<PathBuf> {
    let mut checked: Vec<PathBuf> = Vec::new();
    for candidate in &outcome.reported_paths {
        checked.push(candidate.clone());
        if extension_of(candidate).as_deref() != Some("mp4") {
            checked.push(candidate.with_extension("mp4"));
        }
        if let Some(name) = candidate.file_name() {
            checked.push(dir.join(name));
        }
    }

    checked
        .into_iter()
        .find(|path| path.is_file() && is_video_file(path))
}

/// Diff-first attribution of one attempt's output file.
pub fn resolve_output(
    dir: &Path,
    before: &HashMap<PathBuf, u64>,
    outcome: &ServiceOutcome,
) -> Option<PathBuf> {
    find_new_video_files(dir, before)
        .into_iter()
        .next()
        .or_else(|| resolve_from_outcome(dir, outcome))
}
