use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{info, Level};

use rust_reports::api::ChathamClient;
use rust_reports::models::{Config, ReportKind};
use rust_reports::pipelines;

/// Generate one report kind on its own, useful for reruns after a partial
/// failure of the full batch
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Report kind: debt, payment or valuation
    #[arg(value_name = "KIND")]
    kind: ReportKind,

    /// Directory the report file is written to
    #[arg(short, long)]
    output_dir: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let client = ChathamClient::new(&config)?;
    let request = pipelines::build_request(args.kind, Local::now().date_naive());

    info!("Generating {} into {}", args.kind, config.output_dir.display());
    let result = pipelines::run_report(&client, &request, &config.output_dir).await;

    if result.success {
        info!(
            "{}: {} records in {:.2}s",
            result.kind, result.record_count, result.duration_seconds
        );
        if let Some(path) = &result.file_path {
            info!("File: {}", path.display());
        }
        Ok(())
    } else {
        anyhow::bail!(
            "{} failed: {}",
            result.kind,
            result.error.unwrap_or_else(|| "Unknown error".to_string())
        )
    }
}
