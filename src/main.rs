mod client;
mod config;
mod enrich;
mod harvest;
mod input;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mp_harvester", about = "Materials Project record harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, enrich and persist every input row
    Run {
        /// Input CSV with mpid, Band_Gap and Bulk_Point columns
        #[arg(short, long, default_value = "data/2d.csv")]
        input: PathBuf,
        /// Directory for raw record artifacts
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        /// Directory for normalized documents
        #[arg(long, default_value = "data/normalized")]
        out_dir: PathBuf,
        /// API host
        #[arg(long, default_value = config::DEFAULT_HOST)]
        host: String,
        /// Pause between rows and before the bibliography fallback, in ms
        #[arg(long, default_value = "1000")]
        delay_ms: u64,
        /// Max rows to process (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Fail the run when a row has no usable title instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Input row count and artifact counts for the output directories
    Stats {
        #[arg(short, long, default_value = "data/2d.csv")]
        input: PathBuf,
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        #[arg(long, default_value = "data/normalized")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            raw_dir,
            out_dir,
            host,
            delay_ms,
            limit,
            strict,
        } => {
            let cfg = config::Config::new(host, raw_dir, out_dir, delay_ms, strict)?;
            let mut rows = input::load_rows(&input)?;
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            if rows.is_empty() {
                println!("No input rows in {}.", input.display());
                return Ok(());
            }

            println!("Harvesting {} materials...", rows.len());
            let stats = harvest::harvest_rows(&cfg, &rows).await?;
            println!(
                "Done: {} rows ({} written, {} skipped) in {:.1}s",
                stats.total,
                stats.written,
                stats.skipped,
                t0.elapsed().as_secs_f64()
            );
        }
        Commands::Stats {
            input,
            raw_dir,
            out_dir,
        } => {
            let rows = input::load_rows(&input)?;
            println!("Input rows: {}", rows.len());
            println!("Raw:        {}", store::count_artifacts(&raw_dir)?);
            println!("Normalized: {}", store::count_artifacts(&out_dir)?);
        }
    }

    Ok(())
}
