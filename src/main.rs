use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod downloader;
mod progress;
mod session;
mod urls;

use cli::Cli;

/// Exit status distinct from ordinary failure when the user interrupts.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // There is no mid-download cancellation; an interrupt stops the whole
    // process with its own exit status.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted by user.");
            std::process::exit(EXIT_INTERRUPTED);
        }
    });

    let code = session::run(cli).await?;
    std::process::exit(code);
}
