//! # Signal Reporter Tests
//!
//! Delivery against a mock callback endpoint: document contents, exactly-once
//! delivery per token, and the retry/terminal split on HTTP status.

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use resource_initializer::error::{ErrorKind, InitializerError};
use resource_initializer::models::{CallbackTarget, CorrelationToken, InitializationResult, TaskPayload};
use resource_initializer::signal::{HttpCallbackTransport, SignalReporter, TransportFailure};

fn target(response_url: String) -> CallbackTarget {
    CallbackTarget {
        response_url,
        stack_id: "arn:aws:cloudformation:us-east-1:123456789012:stack/blog/6a1b".to_string(),
        logical_resource_id: "MyRdsInit".to_string(),
        physical_resource_id: "MyRdsInit-0123456789ab".to_string(),
    }
}

fn http_reporter(max_attempts: u32) -> SignalReporter {
    let transport = Arc::new(HttpCallbackTransport::new(Duration::from_secs(2)).unwrap());
    SignalReporter::new(transport, max_attempts, Duration::from_millis(5))
}

fn payload() -> TaskPayload {
    let mut payload = TaskPayload::new();
    payload.insert("rowsInserted".to_string(), "5".to_string());
    payload.insert("statementsApplied".to_string(), "2".to_string());
    payload
}

#[tokio::test]
async fn success_is_delivered_once_with_token_and_payload() -> anyhow::Result<()> {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("PUT", "/cfn-response")
        .match_query(Matcher::UrlEncoded("X-Amz-Signature".into(), "sig".into()))
        .match_body(Matcher::Json(json!({
            "Status": "SUCCESS",
            "PhysicalResourceId": "MyRdsInit-0123456789ab",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/blog/6a1b",
            "RequestId": "t1",
            "LogicalResourceId": "MyRdsInit",
            "NoEcho": false,
            "Data": { "rowsInserted": "5", "statementsApplied": "2" }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let reporter = http_reporter(3);
    let token = CorrelationToken::new("t1");
    let ack = reporter
        .report(
            &token,
            &target(format!("{}/cfn-response?X-Amz-Signature=sig", server.url())),
            &InitializationResult::success(payload()),
            None,
        )
        .await?;

    assert_eq!(ack.token, token);
    assert_eq!(ack.attempts, 1);
    assert!(reporter.is_delivered(&token));
    callback.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn duplicate_report_is_refused_without_a_second_request() {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("PUT", "/cfn-response")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let reporter = http_reporter(3);
    let token = CorrelationToken::new("t1");
    let target = target(format!("{}/cfn-response", server.url()));
    let result = InitializationResult::success(payload());

    reporter.report(&token, &target, &result, None).await.unwrap();
    let err = reporter
        .report(&token, &target, &result, None)
        .await
        .unwrap_err();

    assert!(matches!(err, InitializerError::AlreadyReported { .. }));
    callback.assert_async().await;
}

#[tokio::test]
async fn failure_reason_is_delivered() {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("PUT", "/cfn-response")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "Status": "FAILED", "RequestId": "t2" })),
            Matcher::Regex(r"timeout: initialization did not complete \(see log stream".to_string()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let reporter = http_reporter(1);
    reporter
        .report(
            &CorrelationToken::new("t2"),
            &target(format!("{}/cfn-response", server.url())),
            &InitializationResult::failed(ErrorKind::Timeout, "timeout: initialization did not complete"),
            Some("2026/10/14/[$LATEST]0f3e"),
        )
        .await
        .unwrap();

    callback.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_the_budget_runs_out() {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("PUT", "/cfn-response")
        .with_status(503)
        .with_body("Slow Down")
        .expect(3)
        .create_async()
        .await;

    let reporter = http_reporter(3);
    let token = CorrelationToken::new("t3");
    let err = reporter
        .report(
            &token,
            &target(format!("{}/cfn-response", server.url())),
            &InitializationResult::success(TaskPayload::new()),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReportingFailure);
    assert!(err.to_string().contains("gave up after 3 attempts"));
    assert!(!reporter.is_delivered(&token));
    callback.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_terminal() {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("PUT", "/cfn-response")
        .with_status(403)
        .with_body("<Error><Code>AccessDenied</Code></Error>")
        .expect(1)
        .create_async()
        .await;

    let reporter = http_reporter(5);
    let err = reporter
        .report(
            &CorrelationToken::new("t4"),
            &target(format!("{}/cfn-response", server.url())),
            &InitializationResult::success(TaskPayload::new()),
            None,
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("403"));
    callback.assert_async().await;
}

#[tokio::test]
async fn transient_failures_then_success() {
    let transport = Arc::new(RecordingTransport::failing(
        2,
        TransportFailure::retryable("connection reset"),
    ));
    let reporter = SignalReporter::new(transport.clone(), 3, Duration::from_millis(1));

    let ack = reporter
        .report(
            &CorrelationToken::new("t5"),
            &target("https://example.invalid/cb".to_string()),
            &InitializationResult::success(payload()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(ack.attempts, 3);
    let documents = transport.documents();
    assert_eq!(documents.len(), 3);
    assert!(documents.iter().all(|d| d["RequestId"] == "t5"));
}

#[tokio::test]
async fn oversized_result_data_is_reported_as_one_failure() {
    let transport = Arc::new(RecordingTransport::default());
    let reporter = SignalReporter::new(transport.clone(), 3, Duration::from_millis(1));

    let mut data = payload();
    data.insert("blob".to_string(), "x".repeat(5_000));

    let ack = reporter
        .report(
            &CorrelationToken::new("t6"),
            &target("https://example.invalid/cb".to_string()),
            &InitializationResult::success(data),
            None,
        )
        .await
        .unwrap();

    assert_eq!(ack.attempts, 1);
    let documents = transport.documents();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["Status"], "FAILED");
    assert_eq!(documents[0]["RequestId"], "t6");
    assert!(documents[0].get("Data").is_none());
    assert!(documents[0]["Reason"]
        .as_str()
        .unwrap()
        .contains("result data exceeded the 4096 byte response limit"));
}
