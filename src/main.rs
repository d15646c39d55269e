//! CLI entry point for comic-dl.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use comic_dl::{Config, Downloader, Error, run_with_shutdown};

/// Download paginated image galleries listed in a config file
#[derive(Debug, Parser)]
#[command(name = "comic-dl", version, about)]
struct Args {
    /// JSON config file
    #[arg(short, long, default_value = "comic-dl.json")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    // parse before tracing so --help prints without logs
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    tracing::debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Cancelled) => {
            tracing::warn!("Interrupted");
            ExitCode::from(130)
        }
        Err(e) => {
            tracing::error!(error = %e, "comic-dl failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> comic_dl::Result<()> {
    let config = Config::from_file(&args.config)?;
    tracing::info!(
        config = %args.config.display(),
        targets = config.targets.len(),
        download_dir = %config.download_dir.display(),
        "Downloader starting"
    );

    let downloader = Downloader::new(config)?;
    let records = run_with_shutdown(downloader).await?;

    for record in &records {
        for content in &record.contents {
            tracing::info!(
                content_id = %content.content_id,
                title = %content.title,
                done = content.done,
                total = content.item_count,
                dropped = content.dropped,
                "Downloaded"
            );
        }
    }
    Ok(())
}
