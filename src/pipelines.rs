//! The three report pipelines: request construction, protocol invocation,
//! flattening, and export, with every failure captured at the pipeline
//! boundary into a `ReportResult`.

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

use crate::api::ChathamClient;
use crate::calendar::previous_business_day;
use crate::exporter;
use crate::flatten::{self, FlatRecord};
use crate::models::{
    JobId, PortfolioQuery, ReportKind, ReportRequest, ReportResult, ReportTemplate, RequestParams,
};

const DEBT_DATA_GROUPINGS: u32 = 31;
const PAYMENT_TEMPLATE_ID: &str = "custom_payment_template";
const VALUATION_TEMPLATE_ID: &str = "valuation_caps_only";

const PAYMENT_FIELDS: [&str; 18] = [
    "PaymentDateForThisPeriod",
    "ChathamReferenceNumber",
    "Portfolio1",
    "ProductType",
    "CounterpartyLegalEntityName",
    "ClientLegalEntityName",
    "Description",
    "TradeDateTime",
    "EffectiveDate",
    "MaturityDate",
    "NotionalCurrency",
    "NotionalAmountDescription",
    "Leg1StrikeRateForThisPeriod",
    "IndexDescription",
    "Leg1SpreadOverIndexForThisPeriod",
    "Leg1IndexRateForThisPeriod",
    "ReportingPeriodPaymentType",
    "NetPaymentAmountForThisPeriod",
];

const VALUATION_FIELDS: [&str; 21] = [
    "ChathamReferenceNumber",
    "ClientLegalEntityName",
    "Portfolio1",
    "HedgedItem",
    "ProductType",
    "OriginalStrike",
    "NotionalCurrency",
    "NotionalAmountDescription",
    "CurrentNotional",
    "IndexDescription",
    "CounterpartyLegalEntityName",
    "TradeDateTime",
    "EffectiveDate",
    "MaturityDate",
    "ValuationDateTimeForReportEnd",
    "ValuationCurrency",
    "IntrinsicValueAsOfReportEnd",
    "TimeValueForReportEnd",
    "AccruedInterestAsOfReportEnd",
    "CleanPriceForReportEnd",
    "CleanPricePlusAccruedInterestForReportEnd",
];

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Same calendar day N years ahead, falling back a day for Feb 29
fn years_ahead(date: NaiveDate, years: i32) -> NaiveDate {
    date.with_year(date.year() + years)
        .unwrap_or_else(|| date - Duration::days(1) + Duration::days(365 * years as i64))
}

/// Build the immutable request for one report kind as of `run_date`
pub fn build_request(kind: ReportKind, run_date: NaiveDate) -> ReportRequest {
    match kind {
        ReportKind::Debt => ReportRequest {
            kind,
            from_date: run_date,
            to_date: years_ahead(run_date, 5),
            as_of_date: Some(previous_business_day(run_date)),
            params: RequestParams::Portfolio {
                data_groupings: DEBT_DATA_GROUPINGS,
            },
        },
        ReportKind::Payment => ReportRequest {
            kind,
            from_date: run_date - Duration::days(365),
            to_date: run_date,
            as_of_date: None,
            params: RequestParams::Template(ReportTemplate {
                id: PAYMENT_TEMPLATE_ID.to_string(),
                report_type: "Payment".to_string(),
                fields: PAYMENT_FIELDS.iter().map(|f| f.to_string()).collect(),
            }),
        },
        ReportKind::Valuation => ReportRequest {
            kind,
            from_date: run_date,
            to_date: years_ahead(run_date, 5),
            as_of_date: None,
            params: RequestParams::Template(ReportTemplate {
                id: VALUATION_TEMPLATE_ID.to_string(),
                report_type: "Transaction".to_string(),
                fields: VALUATION_FIELDS.iter().map(|f| f.to_string()).collect(),
            }),
        },
    }
}

/// Run one report pipeline to completion. Failures never propagate past
/// this boundary; they come back as a failed `ReportResult`.
pub async fn run_report(
    client: &ChathamClient,
    request: &ReportRequest,
    output_dir: &Path,
) -> ReportResult {
    let start = Instant::now();
    info!("Starting {}...", request.kind);

    let records = match collect_records(client, request).await {
        Ok(records) => records,
        Err(e) => {
            error!("{} failed: {:#}", request.kind, e);
            return ReportResult::failed(
                request.kind,
                format!("{e:#}"),
                start.elapsed().as_secs_f64(),
            );
        }
    };

    let path = output_dir.join(request.kind.file_name());
    match exporter::export_records(&records, &exporter::run_timestamp(), &path) {
        Ok(outcome) => {
            let duration = start.elapsed().as_secs_f64();
            info!(
                "{} completed in {:.2}s: {} rows -> {}",
                request.kind,
                duration,
                outcome.rows_written,
                outcome.file_path.display()
            );
            ReportResult::succeeded(
                request.kind,
                outcome.file_path,
                outcome.file_size,
                outcome.rows_written,
                duration,
            )
        }
        Err(e) => {
            error!("{} export failed: {:#}", request.kind, e);
            ReportResult::failed(
                request.kind,
                format!("{e:#}"),
                start.elapsed().as_secs_f64(),
            )
        }
    }
}

async fn collect_records(
    client: &ChathamClient,
    request: &ReportRequest,
) -> Result<Vec<FlatRecord>> {
    match &request.params {
        RequestParams::Portfolio { data_groupings } => {
            let query = PortfolioQuery {
                fromdate: fmt_date(request.from_date),
                todate: fmt_date(request.to_date),
                asofdate: fmt_date(
                    request
                        .as_of_date
                        .unwrap_or_else(|| previous_business_day(request.from_date)),
                ),
                datagroupings: *data_groupings,
            };

            let job_id = client.submit_portfolio_query(&query).await?;
            info!("{} queued as job {}", request.kind, job_id);

            let xml = client.fetch_report_xml(&job_id).await?;
            let records = flatten::flatten_xml_records(&xml, "Instruments", "Loan")
                .map_err(crate::api::ReportError::Xml)?;
            Ok(records)
        }
        RequestParams::Template(template) => {
            client.upsert_template(template).await?;

            let items = match request.kind {
                ReportKind::Payment => {
                    client
                        .fetch_paginated_payments(&template.id, request.from_date, request.to_date)
                        .await?
                }
                _ => {
                    let body = client
                        .fetch_transactions_report(&template.id, request.from_date, request.to_date)
                        .await?;

                    match body.job_id.as_ref().and_then(JobId::from_value) {
                        Some(job_id) => {
                            info!("{} queued as job {}", request.kind, job_id);
                            client.poll_report_job(&job_id).await?.items
                        }
                        None => body.items,
                    }
                }
            };

            Ok(flatten::json_items_to_records(items))
        }
    }
}
