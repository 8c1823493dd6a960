// Console progress rendering

use std::io::Write;
use std::sync::Mutex;

use crate::downloader::{ProgressSink, ProgressStatus, ProgressUpdate};

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Single rewriting status line on stderr. Line length is tracked so a
/// shorter update fully overwrites a longer one.
pub struct ConsoleProgress {
    last_len: Mutex<usize>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            last_len: Mutex::new(0),
        }
    }

    fn render(&self, line: &str) {
        let mut last_len = self.last_len.lock().unwrap();
        let padding = last_len.saturating_sub(line.chars().count());
        eprint!("\r{}{}", line, " ".repeat(padding));
        let _ = std::io::stderr().flush();
        *last_len = line.chars().count();
    }

    /// End the rewriting line so subsequent output starts clean.
    pub fn clear_line(&self) {
        let mut last_len = self.last_len.lock().unwrap();
        if *last_len > 0 {
            eprint!("\r{}\r", " ".repeat(*last_len));
            let _ = std::io::stderr().flush();
            *last_len = 0;
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, update: ProgressUpdate) {
        match update.status {
            ProgressStatus::Finished => {
                self.render("download complete, merging...");
            }
            ProgressStatus::InProgress => {
                let percent = update
                    .percent
                    .map(|p| format!("{:5.1}%", p))
                    .unwrap_or_else(|| "  ?  %".to_string());
                let transferred = match (update.downloaded_bytes, update.total_bytes) {
                    (Some(done), Some(total)) => {
                        format!("{} / {}", format_bytes(done), format_bytes(total))
                    }
                    (Some(done), None) => format_bytes(done),
                    _ => "-".to_string(),
                };
                let rate = update.rate.as_deref().unwrap_or("-");
                let eta = update.eta.as_deref().unwrap_or("-");
                self.render(&format!(
                    "{} | {} | speed: {} | eta: {}",
                    percent, transferred, rate, eta
                ));
            }
        }
    }
}
