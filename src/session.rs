// Session driver: collect input, confirm, run the orchestrator per URL,
// aggregate results into a report.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::cli::Cli;
use crate::downloader::{
    detect_cookie_source, DownloadResult, Downloader, MediaService, YtDlpService,
};
use crate::progress::ConsoleProgress;
use crate::urls::extract_urls;

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;

/// Aligned plain-text table for the runtime/queue/results summaries.
fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("-- {} --\n", title));
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    out.push_str(&header_line.join("  "));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Is an ffmpeg executable reachable through PATH?
fn ffmpeg_in_path() -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| {
        dir.join("ffmpeg").is_file() || dir.join("ffmpeg.exe").is_file()
    })
}

fn collect_raw_input(cli: &Cli) -> Result<String, String> {
    let mut chunks: Vec<String> = Vec::new();
    if let Some(links_file) = &cli.links_file {
        let text = std::fs::read_to_string(links_file)
            .map_err(|_| format!("Links file does not exist: {}", links_file.display()))?;
        chunks.push(text);
    }
    if !cli.urls.is_empty() {
        chunks.push(cli.urls.join(" "));
    }
    if !chunks.is_empty() {
        return Ok(chunks.join("\n"));
    }

    println!("Paste one or more YouTube links.");
    println!("You can paste multiple lines or comma-separated links.");
    println!("Press Enter on an empty line to start.");

    let stdin = std::io::stdin();
    let mut lines: Vec<String> = Vec::new();
    loop {
        print!("link> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim().to_string();
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn confirm_start() -> bool {
    print!("Start download now? [Y/n]: ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

fn render_queue(urls: &[String]) -> String {
    let rows: Vec<Vec<String>> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| vec![(i + 1).to_string(), url.clone()])
        .collect();
    render_table("Download Queue", &["#", "YouTube URL"], &rows)
}

fn render_results(results: &[DownloadResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let file_name = result
                .output_file
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "-".to_string());
            let details = if result.success {
                result.strategy.clone()
            } else {
                result.error.clone()
            };
            vec![
                (i + 1).to_string(),
                if result.success { "OK" } else { "FAILED" }.to_string(),
                if result.title.is_empty() { "-".to_string() } else { result.title.clone() },
                file_name,
                details,
            ]
        })
        .collect();
    render_table("Results", &["#", "Status", "Title", "File", "Details"], &rows)
}

fn exit_code(success_count: usize) -> i32 {
    if success_count == 0 {
        EXIT_FAILURE
    } else {
        EXIT_OK
    }
}

/// Run one full download session. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let base_dir = std::env::current_dir()?;
    let output_dir = base_dir.join("output");
    let system_dir = base_dir.join("system");
    std::fs::create_dir_all(&output_dir)?;
    std::fs::create_dir_all(&system_dir)?;

    println!("YouTube to MP4");
    println!("Automatic cookie detection + highest quality fallback downloader.");
    println!();

    let service = YtDlpService::new(output_dir.clone());
    if !service.is_available() {
        println!("yt-dlp was not found. Install it and re-run.");
        return Ok(EXIT_FAILURE);
    }

    println!("Detecting cookie source...");
    let cookie_source = detect_cookie_source(&base_dir, &service).await;

    let runtime_rows = vec![
        vec!["Output folder".to_string(), output_dir.display().to_string()],
        vec!["Cookie mode".to_string(), cookie_source.description()],
        vec![
            "ffmpeg in PATH".to_string(),
            if ffmpeg_in_path() {
                "yes".to_string()
            } else {
                "no (required for reliable mp4 merging)".to_string()
            },
        ],
    ];
    println!("{}", render_table("Runtime", &["Setting", "Value"], &runtime_rows));

    let raw_input = match collect_raw_input(&cli) {
        Ok(text) => text,
        Err(message) => {
            println!("{}", message);
            return Ok(EXIT_FAILURE);
        }
    };

    let urls = extract_urls(&raw_input);
    if urls.is_empty() {
        println!("No valid YouTube video links were found.");
        return Ok(EXIT_FAILURE);
    }

    println!("{}", render_queue(&urls));
    if !cli.no_confirm && !confirm_start() {
        println!("Canceled.");
        return Ok(EXIT_OK);
    }

    let downloader = Downloader::new(Box::new(service), output_dir.clone());
    let mut results: Vec<DownloadResult> = Vec::new();
    let total = urls.len();
    for (index, url) in urls.iter().enumerate() {
        println!("Video {}/{} {}", index + 1, total, url);
        info!(url = %url, "processing video");

        let progress = ConsoleProgress::new();
        let result = downloader.download_one(url, &cookie_source, &progress).await;
        progress.clear_line();

        if result.success {
            let file_name = result
                .output_file
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("OK {} -> {}", result.title, file_name);
        } else {
            println!("FAILED {} -> {}", url, result.error);
        }
        results.push(result);
    }

    let success_count = results.iter().filter(|r| r.success).count();
    let failed_count = total - success_count;

    println!("{}", render_results(&results));
    println!("Completed. Success: {} | Failed: {}", success_count, failed_count);
    println!("Output folder: {}", output_dir.display());

    Ok(exit_code(success_count))
}
