use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub mod chatham_client;
pub use chatham_client::ChathamClient;

/// Fixed-interval retry policy for report retrieval and job polling.
///
/// Each protocol carries its own policy so tests can swap in a zero-delay
/// variant instead of waiting out production sleeps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Debt report retrieval: 5 attempts, 30 seconds apart
    pub fn retrieval_default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }

    /// Async job polling: 30 attempts, 5 seconds apart
    pub fn polling_default() -> Self {
        Self::new(30, Duration::from_secs(5))
    }

    /// Same attempt bounds with no sleeping, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// Errors surfaced by the report API client
#[derive(Debug, Error)]
pub enum ReportError {
    /// The job submit call did not yield a usable job id
    #[error("job id unavailable: {0}")]
    JobIdUnavailable(String),

    /// Template upsert returned a non-success status
    #[error("template creation failed with status {0}")]
    TemplateCreationFailed(StatusCode),

    /// Initial report fetch returned a non-success status
    #[error("report fetch failed with status {0}")]
    ReportFetchFailed(StatusCode),

    /// Report retrieval stayed unavailable through every retry
    #[error("report not available after {0} attempts")]
    RetrievalExhausted(u32),

    /// Job status poll returned something other than ready/processing
    #[error("unexpected job status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    /// Job never became ready within the polling budget
    #[error("report generation timed out after {0} poll attempts")]
    PollTimeout(u32),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed XML report: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies_match_protocol_budgets() {
        let retrieval = RetryPolicy::retrieval_default();
        assert_eq!(retrieval.max_attempts, 5);
        assert_eq!(retrieval.delay, Duration::from_secs(30));

        let polling = RetryPolicy::polling_default();
        assert_eq!(polling.max_attempts, 30);
        assert_eq!(polling.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_error_messages_name_the_failure() {
        let err = ReportError::RetrievalExhausted(5);
        assert_eq!(err.to_string(), "report not available after 5 attempts");

        let err = ReportError::PollTimeout(30);
        assert_eq!(err.to_string(), "report generation timed out after 30 poll attempts");
    }
}
