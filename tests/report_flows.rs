//! End-to-end report flows against a mock API server: retry and poll
//! bounds, pagination accounting, and full pipeline runs down to the
//! exported file.

use chrono::{Duration, Local};
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rust_reports::api::{ChathamClient, ReportError, RetryPolicy};
use rust_reports::models::{Config, JobId, ReportKind};
use rust_reports::pipelines;
use rust_reports::runner::{self, ExecutionMode};

const LOAN_XML: &str = r#"<PortfolioReport xmlns:ns="http://schemas.datacontract.org/2009/11/Chatham.FMS.Data">
  <ns:Instruments>
    <ns:Loan>
      <ns:Amount>1000</ns:Amount>
      <ns:Currency>USD</ns:Currency>
    </ns:Loan>
  </ns:Instruments>
</PortfolioReport>"#;

fn test_config(server: &MockServer, output_dir: &std::path::Path) -> Config {
    Config {
        api_token: "test-token".to_string(),
        api_endpoint: server.uri(),
        output_dir: output_dir.to_path_buf(),
        max_workers: 3,
    }
}

fn fast_client(config: &Config) -> ChathamClient {
    ChathamClient::with_policies(config, RetryPolicy::immediate(5), RetryPolicy::immediate(30))
        .unwrap()
}

fn read_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn retrieval_gives_up_after_exactly_five_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report/j-retry"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = fast_client(&test_config(&server, dir.path()));

    let err = client
        .fetch_report_xml(&JobId("j-retry".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::RetrievalExhausted(5)));
}

#[tokio::test]
async fn polling_times_out_after_exactly_thirty_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report/j-poll"))
        .respond_with(ResponseTemplate::new(202))
        .expect(30)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = fast_client(&test_config(&server, dir.path()));

    let err = client
        .poll_report_job(&JobId("j-poll".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::PollTimeout(30)));
}

#[tokio::test]
async fn pagination_collects_reported_total_in_minimal_pages() {
    let server = MockServer::start().await;
    let page = |start: usize, count: usize, total: usize| {
        json!({
            "Items": (start..start + count).map(|i| json!({"Id": i})).collect::<Vec<_>>(),
            "Paging": {"TotalRecords": total}
        })
    };

    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0, 100, 250)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(100, 100, 250)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .and(query_param("offset", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(200, 50, 250)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = fast_client(&test_config(&server, dir.path()));

    let today = Local::now().date_naive();
    let items = client
        .fetch_paginated_payments("custom_payment_template", today - Duration::days(365), today)
        .await
        .unwrap();
    assert_eq!(items.len(), 250);
}

#[tokio::test]
async fn failing_page_stops_pagination_with_partial_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": (0..100).map(|i| json!({"Id": i})).collect::<Vec<_>>(),
            "Paging": {"TotalRecords": 250}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = fast_client(&test_config(&server, dir.path()));

    let today = Local::now().date_naive();
    let items = client
        .fetch_paginated_payments("custom_payment_template", today - Duration::days(365), today)
        .await
        .unwrap();
    assert_eq!(items.len(), 100);
}

#[tokio::test]
async fn failing_initial_fetch_is_an_error_not_partial_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = fast_client(&test_config(&server, dir.path()));

    let today = Local::now().date_naive();
    let err = client
        .fetch_paginated_payments("custom_payment_template", today - Duration::days(365), today)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::ReportFetchFailed(_)));
}

#[tokio::test]
async fn debt_pipeline_writes_one_loan_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report/portfolio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JobId": "j-debt"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report/j-debt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOAN_XML))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let client = fast_client(&config);
    let request = pipelines::build_request(ReportKind::Debt, Local::now().date_naive());

    let result = pipelines::run_report(&client, &request, &config.output_dir).await;
    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert_eq!(result.record_count, 1);
    assert!(result.file_size.unwrap() > 0);

    let rows = read_rows(&dir.path().join("Debt_Report.csv"));
    assert_eq!(rows[0], vec!["RunDate", "Amount", "Currency"]);
    assert_eq!(rows[1][1], "1000");
    assert_eq!(rows[1][2], "USD");
    assert!(!rows[1][0].is_empty());
}

#[tokio::test]
async fn valuation_pipeline_polls_async_job_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/transactions/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JobId": "j-val"})))
        .mount(&server)
        .await;
    // First poll reports still-processing, second delivers the payload
    Mock::given(method("GET"))
        .and(path("/report/j-val"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report/j-val"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"CurrentNotional": 5000000, "NotionalCurrency": "USD"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let client = fast_client(&config);
    let request = pipelines::build_request(ReportKind::Valuation, Local::now().date_naive());

    let result = pipelines::run_report(&client, &request, &config.output_dir).await;
    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert_eq!(result.record_count, 1);

    let rows = read_rows(&dir.path().join("Valuation_Report.csv"));
    assert_eq!(rows[0], vec!["RunDate", "CurrentNotional", "NotionalCurrency"]);
    assert_eq!(rows[1][1], "5000000");
}

#[tokio::test]
async fn valuation_inline_response_skips_polling() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/transactions/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"ProductType": "Cap"}, {"ProductType": "Swap"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let client = fast_client(&config);
    let request = pipelines::build_request(ReportKind::Valuation, Local::now().date_naive());

    let result = pipelines::run_report(&client, &request, &config.output_dir).await;
    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert_eq!(result.record_count, 2);
}

#[tokio::test]
async fn empty_payment_report_still_produces_marker_file() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [],
            "Paging": {"TotalRecords": 0}
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let client = fast_client(&config);
    let request = pipelines::build_request(ReportKind::Payment, Local::now().date_naive());

    let result = pipelines::run_report(&client, &request, &config.output_dir).await;
    assert!(result.success, "pipeline failed: {:?}", result.error);

    let rows = read_rows(&dir.path().join("Payment_Report.csv"));
    assert_eq!(rows[0], vec!["RunDate", "Message"]);
    assert_eq!(rows[1][1], "No data found");
    assert!(!rows[1][0].is_empty());
}

/// A full run where debt fails at submit time while the other two reports
/// succeed: the failure stays isolated and the summary reflects it
#[tokio::test]
async fn one_failing_report_does_not_abort_the_run() {
    let server = MockServer::start().await;
    // Debt submit rejected outright, no retries involved
    Mock::given(method("POST"))
        .and(path("/report/portfolio"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"NetPaymentAmountForThisPeriod": "125.50"}],
            "Paging": {"TotalRecords": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/transactions/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"ProductType": "Cap"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let summary = runner::run_all_reports(&config, ExecutionMode::Sequential)
        .await
        .unwrap();
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_records, 2);

    let debt = summary
        .results
        .iter()
        .find(|r| r.kind == ReportKind::Debt)
        .unwrap();
    assert!(!debt.success);
    assert!(debt.error.as_deref().unwrap().contains("job id unavailable"));
    assert!(dir.path().join("Payment_Report.csv").exists());
    assert!(dir.path().join("Valuation_Report.csv").exists());
    assert!(!dir.path().join("Debt_Report.csv").exists());
}

#[tokio::test]
async fn parallel_run_produces_all_three_files() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report/portfolio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"JobId": "j-debt"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report/j-debt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOAN_XML))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/payments/custom_payment_template"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"NetPaymentAmountForThisPeriod": "125.50"}],
            "Paging": {"TotalRecords": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reporting/templates/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reporting/reports/transactions/valuation_caps_only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"ProductType": "Cap"}]
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = test_config(&server, dir.path());

    let summary = runner::run_all_reports(&config, ExecutionMode::Parallel)
        .await
        .unwrap();
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total_records, 3);
    assert!(dir.path().join("Debt_Report.csv").exists());
    assert!(dir.path().join("Payment_Report.csv").exists());
    assert!(dir.path().join("Valuation_Report.csv").exists());
}
