use chrono::NaiveDate;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{Config, JobId, JobSubmitResponse, PortfolioQuery, ReportBody, ReportTemplate};
use super::{ReportError, RetryPolicy};

/// Page size used for offset/limit pagination
const PAGE_LIMIT: usize = 100;

/// Client for the Chatham reporting API
///
/// Wraps the three retrieval protocols:
/// - submit a portfolio query, then fetch the XML report by job id with retries
/// - upsert a template, then page through a JSON report with offset/limit
/// - upsert a template, then poll an async report job until it is ready
pub struct ChathamClient {
    client: Client,
    base_url: String,
    api_token: String,
    retrieval_policy: RetryPolicy,
    polling_policy: RetryPolicy,
}

impl ChathamClient {
    /// Create a new client with the production retry/poll policies
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_policies(
            config,
            RetryPolicy::retrieval_default(),
            RetryPolicy::polling_default(),
        )
    }

    /// Create a client with explicit policies (tests use zero-delay ones)
    pub fn with_policies(
        config: &Config,
        retrieval_policy: RetryPolicy,
        polling_policy: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("rust-reports/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_endpoint.clone(),
            api_token: config.api_token.clone(),
            retrieval_policy,
            polling_policy,
        })
    }

    fn json_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(auth) = HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    fn xml_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));
        if let Ok(auth) = HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    /// Submit a portfolio query to the job queue and extract the job id
    /// (Protocol A, step 1)
    pub async fn submit_portfolio_query(
        &self,
        query: &PortfolioQuery,
    ) -> Result<JobId, ReportError> {
        let url = format!("{}/report/portfolio", self.base_url);
        debug!("Submitting portfolio query to {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.json_headers())
            .json(query)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::JobIdUnavailable(format!(
                "submit returned status {status}"
            )));
        }

        let body: JobSubmitResponse = response.json().await?;
        body.job_id
            .as_ref()
            .and_then(JobId::from_value)
            .ok_or_else(|| {
                ReportError::JobIdUnavailable("JobId missing from submit response".to_string())
            })
    }

    /// Fetch the XML report for a queued job, retrying on any non-200
    /// (Protocol A, steps 2-4)
    pub async fn fetch_report_xml(&self, job_id: &JobId) -> Result<String, ReportError> {
        let url = format!("{}/report/{}", self.base_url, job_id);
        let policy = self.retrieval_policy;

        for attempt in 1..=policy.max_attempts {
            let response = self
                .client
                .get(&url)
                .headers(self.xml_headers())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::OK {
                debug!("Report {} ready on attempt {}", job_id, attempt);
                return Ok(response.text().await?);
            }

            warn!(
                "Report {} not available (status {}), attempt {}/{}",
                job_id, status, attempt, policy.max_attempts
            );
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.delay).await;
            }
        }

        Err(ReportError::RetrievalExhausted(policy.max_attempts))
    }

    /// Create or update a server-persisted report template
    /// (Protocols B and C, step 1)
    pub async fn upsert_template(&self, template: &ReportTemplate) -> Result<(), ReportError> {
        let url = format!("{}/reporting/templates/{}", self.base_url, template.id);
        debug!("Upserting template {}", template.id);

        let response = self
            .client
            .put(&url)
            .headers(self.json_headers())
            .json(template)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::TemplateCreationFailed(status));
        }
        Ok(())
    }

    /// Fetch a payments report page by page until the reported total is
    /// reached. A failing or empty page stops accumulation early; whatever
    /// was collected up to that point is returned. (Protocol B, steps 2-4)
    pub async fn fetch_paginated_payments(
        &self,
        template_id: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<Value>, ReportError> {
        let url = format!("{}/reporting/reports/payments/{}", self.base_url, template_id);
        let from = from_date.format("%Y-%m-%d").to_string();
        let to = to_date.format("%Y-%m-%d").to_string();
        let limit = PAGE_LIMIT.to_string();

        let response = self
            .client
            .get(&url)
            .headers(self.json_headers())
            .query(&[
                ("transactionactivefromdate", from.as_str()),
                ("transactionactivetodate", to.as_str()),
                ("offset", "0"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::ReportFetchFailed(status));
        }

        let first_page: ReportBody = response.json().await?;
        let total_records = first_page
            .paging
            .as_ref()
            .map(|p| p.total_records)
            .unwrap_or(0);
        let mut items = first_page.items;
        debug!(
            "First payments page: {} items, {} total reported",
            items.len(),
            total_records
        );

        while items.len() < total_records {
            let offset = items.len().to_string();
            let page_response = self
                .client
                .get(&url)
                .headers(self.json_headers())
                .query(&[
                    ("transactionactivefromdate", from.as_str()),
                    ("transactionactivetodate", to.as_str()),
                    ("offset", offset.as_str()),
                    ("limit", limit.as_str()),
                ])
                .send()
                .await?;

            if page_response.status() != StatusCode::OK {
                warn!(
                    "Payments page at offset {} returned status {}, stopping with partial data",
                    offset,
                    page_response.status()
                );
                break;
            }

            let page: ReportBody = page_response.json().await?;
            if page.items.is_empty() {
                warn!("Payments page at offset {} was empty, stopping", offset);
                break;
            }
            items.extend(page.items);
        }

        info!("Collected {} payment items", items.len());
        Ok(items)
    }

    /// Request a transactions report; the response either carries inline
    /// items or a job id for async processing (Protocol C, step 2)
    pub async fn fetch_transactions_report(
        &self,
        template_id: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<ReportBody, ReportError> {
        let url = format!(
            "{}/reporting/reports/transactions/{}",
            self.base_url, template_id
        );

        let response = self
            .client
            .get(&url)
            .headers(self.json_headers())
            .query(&[
                ("ActiveFromDate", from_date.format("%Y-%m-%d").to_string()),
                ("ActiveToDate", to_date.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReportError::ReportFetchFailed(status));
        }

        Ok(response.json().await?)
    }

    /// Poll an async report job until ready. 200 means ready, 202 means
    /// still processing, anything else fails immediately.
    /// (Protocol C, steps 3-4)
    pub async fn poll_report_job(&self, job_id: &JobId) -> Result<ReportBody, ReportError> {
        let url = format!("{}/report/{}", self.base_url, job_id);
        let policy = self.polling_policy;

        for attempt in 1..=policy.max_attempts {
            let response = self
                .client
                .get(&url)
                .headers(self.json_headers())
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::OK {
                debug!("Job {} ready after {} polls", job_id, attempt);
                return Ok(response.json().await?);
            } else if status == StatusCode::ACCEPTED {
                debug!(
                    "Job {} still processing, poll {}/{}",
                    job_id, attempt, policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                return Err(ReportError::UnexpectedStatus { status, body });
            }
        }

        Err(ReportError::PollTimeout(policy.max_attempts))
    }
}
