use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_reports::models::Config;
use rust_reports::runner::{self, ExecutionMode};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch financial report generator", long_about = None)]
struct Args {
    /// Run the three report pipelines concurrently instead of one by one
    #[arg(short, long)]
    parallel: bool,

    /// Worker pool size for parallel runs
    #[arg(short, long)]
    workers: Option<usize>,

    /// Directory the report files are written to
    #[arg(short, long)]
    output_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_reports=info".into()),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Configuration error: {e}");
            eprintln!("Make sure CHATHAM_API_TOKEN is set (a .env file works too).");
            std::process::exit(1);
        }
    };
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };

    info!("Financial report generator starting");
    if let Ok(cwd) = std::env::current_dir() {
        info!("Working directory: {}", cwd.display());
    }
    info!("Output directory: {}", config.output_dir.display());
    info!("Execution mode: {:?}", mode);

    let summary = runner::run_all_reports(&config, mode).await?;
    runner::log_summary(&summary, &config);

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
