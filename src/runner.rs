//! Run orchestration: drives the three report pipelines either one after
//! another or through a bounded worker pool, and aggregates the outcome.
//!
//! Pipelines are independent (distinct endpoints, distinct output files);
//! a failure or crash in one never aborts its siblings.

use anyhow::Result;
use chrono::Local;
use futures::future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::api::ChathamClient;
use crate::models::{Config, ReportKind, ReportResult};
use crate::pipelines;

/// How the three pipelines are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Aggregated outcome of a whole run
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<ReportResult>,
    pub successful: usize,
    pub failed: usize,
    pub total_records: usize,
    pub total_seconds: f64,
}

/// Run all report pipelines and aggregate their results
pub async fn run_all_reports(config: &Config, mode: ExecutionMode) -> Result<RunSummary> {
    let start = Instant::now();
    let run_date = Local::now().date_naive();
    let mut results = Vec::with_capacity(ReportKind::all().len());

    match mode {
        ExecutionMode::Sequential => {
            let client = ChathamClient::new(config)?;
            for kind in ReportKind::all() {
                let request = pipelines::build_request(kind, run_date);
                results.push(pipelines::run_report(&client, &request, &config.output_dir).await);
            }
        }
        ExecutionMode::Parallel => {
            let workers = config.max_workers.max(1);
            info!("Running {} reports across {} workers", ReportKind::all().len(), workers);
            let semaphore = Arc::new(Semaphore::new(workers));

            let mut handles = Vec::new();
            for kind in ReportKind::all() {
                let semaphore = Arc::clone(&semaphore);
                let config = config.clone();

                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await?;
                    let client = ChathamClient::new(&config)?;
                    let request = pipelines::build_request(kind, run_date);
                    Ok::<_, anyhow::Error>(
                        pipelines::run_report(&client, &request, &config.output_dir).await,
                    )
                });
                handles.push((kind, handle));
            }

            let joined = future::join_all(
                handles
                    .into_iter()
                    .map(|(kind, handle)| async move { (kind, handle.await) }),
            )
            .await;

            for (kind, outcome) in joined {
                let result = match outcome {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => ReportResult::failed(kind, format!("{e:#}"), 0.0),
                    Err(e) => {
                        error!("{} task crashed: {}", kind, e);
                        ReportResult::failed(kind, format!("task crashed: {e}"), 0.0)
                    }
                };
                results.push(result);
            }
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;
    let total_records = results.iter().map(|r| r.record_count).sum();

    Ok(RunSummary {
        results,
        successful,
        failed,
        total_records,
        total_seconds: start.elapsed().as_secs_f64(),
    })
}

/// Log the per-report lines and totals of a finished run
pub fn log_summary(summary: &RunSummary, config: &Config) {
    info!("{}", "=".repeat(50));
    info!("REPORT GENERATION SUMMARY");
    info!("{}", "=".repeat(50));

    for result in &summary.results {
        if result.success {
            info!(
                "{}: {} records ({:.2}s)",
                result.kind, result.record_count, result.duration_seconds
            );
            if let (Some(path), Some(size)) = (&result.file_path, result.file_size) {
                info!("  File: {} ({} bytes)", path.display(), size);
            }
        } else {
            error!(
                "{}: {}",
                result.kind,
                result.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }

    info!("{}", "-".repeat(50));
    info!("Total: {} successful, {} failed", summary.successful, summary.failed);
    info!("Total records: {}", summary.total_records);
    info!("Total time: {:.2}s", summary.total_seconds);
    info!("Output folder: {}", config.output_dir.display());

    if summary.failed == 0 {
        info!("All reports generated successfully!");
    } else {
        warn!("{} report(s) failed. Check logs for details.", summary.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(kind: ReportKind, success: bool, records: usize) -> ReportResult {
        if success {
            ReportResult::succeeded(kind, PathBuf::from("/tmp/x.csv"), 10, records, 0.1)
        } else {
            ReportResult::failed(kind, "boom".to_string(), 0.1)
        }
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            result(ReportKind::Debt, true, 5),
            result(ReportKind::Payment, false, 0),
            result(ReportKind::Valuation, true, 7),
        ];

        let successful = results.iter().filter(|r| r.success).count();
        let summary = RunSummary {
            failed: results.len() - successful,
            total_records: results.iter().map(|r| r.record_count).sum(),
            successful,
            results,
            total_seconds: 1.0,
        };

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_records, 12);
    }
}
