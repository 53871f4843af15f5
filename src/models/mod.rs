use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// The three report kinds produced by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    Debt,
    Payment,
    Valuation,
}

impl ReportKind {
    pub fn all() -> [ReportKind; 3] {
        [ReportKind::Debt, ReportKind::Payment, ReportKind::Valuation]
    }

    /// Human-readable name used in logs and summaries
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportKind::Debt => "Debt Report",
            ReportKind::Payment => "Payment Report",
            ReportKind::Valuation => "Valuation Report",
        }
    }

    /// Output file name inside the configured output directory
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportKind::Debt => "Debt_Report.csv",
            ReportKind::Payment => "Payment_Report.csv",
            ReportKind::Valuation => "Valuation_Report.csv",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debt" => Ok(ReportKind::Debt),
            "payment" => Ok(ReportKind::Payment),
            "valuation" => Ok(ReportKind::Valuation),
            other => Err(format!("unknown report kind: {other}")),
        }
    }
}

/// Kind-specific request parameters
#[derive(Debug, Clone)]
pub enum RequestParams {
    /// Portfolio query submitted to the job queue (debt report)
    Portfolio { data_groupings: u32 },
    /// Server-persisted field template (payment and valuation reports)
    Template(ReportTemplate),
}

/// One report request, built fresh per run and immutable afterwards
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Valuation-as-of date, the previous business day (debt report only)
    pub as_of_date: Option<NaiveDate>,
    pub params: RequestParams,
}

/// Template definition upserted to the reporting API before generation
#[derive(Debug, Clone, Serialize)]
pub struct ReportTemplate {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Type")]
    pub report_type: String,
    #[serde(rename = "Fields")]
    pub fields: Vec<String>,
}

/// Portfolio query payload for the job-queue submit endpoint
#[derive(Debug, Serialize)]
pub struct PortfolioQuery {
    pub fromdate: String,
    pub todate: String,
    pub asofdate: String,
    pub datagroupings: u32,
}

/// Opaque identifier for an asynchronously-processing report job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(pub String);

impl JobId {
    /// The API returns JobId as either a JSON string or a number
    pub fn from_value(value: &Value) -> Option<JobId> {
        match value {
            Value::String(s) if !s.is_empty() => Some(JobId(s.clone())),
            Value::Number(n) => Some(JobId(n.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response from the portfolio job submit endpoint
#[derive(Debug, Deserialize)]
pub struct JobSubmitResponse {
    #[serde(rename = "JobId")]
    pub job_id: Option<Value>,
}

/// Paging metadata attached to paginated report responses
#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(rename = "TotalRecords", default)]
    pub total_records: usize,
}

/// Body of a JSON report response; transactions responses may carry a
/// JobId instead of inline items
#[derive(Debug, Default, Deserialize)]
pub struct ReportBody {
    #[serde(rename = "Items", default)]
    pub items: Vec<Value>,
    #[serde(rename = "Paging")]
    pub paging: Option<Paging>,
    #[serde(rename = "JobId")]
    pub job_id: Option<Value>,
}

/// Outcome of a single report pipeline run
#[derive(Debug, Clone)]
pub struct ReportResult {
    pub kind: ReportKind,
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub record_count: usize,
    pub duration_seconds: f64,
    pub error: Option<String>,
}

impl ReportResult {
    pub fn succeeded(
        kind: ReportKind,
        file_path: PathBuf,
        file_size: u64,
        record_count: usize,
        duration_seconds: f64,
    ) -> Self {
        Self {
            kind,
            success: true,
            file_path: Some(file_path),
            file_size: Some(file_size),
            record_count,
            duration_seconds,
            error: None,
        }
    }

    pub fn failed(kind: ReportKind, error: String, duration_seconds: f64) -> Self {
        Self {
            kind,
            success: false,
            file_path: None,
            file_size: None,
            record_count: 0,
            duration_seconds,
            error: Some(error),
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: String,
    pub api_endpoint: String,
    pub output_dir: PathBuf,
    pub max_workers: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            api_token: std::env::var("CHATHAM_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("CHATHAM_API_TOKEN environment variable required"))?,
            api_endpoint: std::env::var("CHATHAM_API_ENDPOINT")
                .unwrap_or_else(|_| "https://api.chathamdirect.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "Generated Files".to_string())
                .into(),
            max_workers: std::env::var("MAX_WORKERS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        })
    }
}
