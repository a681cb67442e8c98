use engage_etl::core::metrics::fetch_metrics;
use engage_etl::core::upsert::{supporters_from_delimited, upsert_supporters};
use engage_etl::domain::endpoint::ApiFamily;
use engage_etl::{EngageClient, LoginConfig};
use httpmock::prelude::*;
use serde_json::json;

fn client_for(server: &MockServer) -> EngageClient {
    let login = LoginConfig::from_yaml_str(&format!(
        "token: test-token\nhost: {}\n",
        server.base_url()
    ))
    .unwrap();
    EngageClient::new(&login, ApiFamily::Integration).unwrap()
}

#[tokio::test]
async fn test_upsert_sends_supporters_in_batches() {
    let server = MockServer::start();
    let upsert = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/integration/ext/v1/supporters")
            .header("authtoken", "test-token")
            .header("content-type", "application/json");
        then.status(200).json_body(json!({
            "payload": {"supporters": [{"supporterId": "s-1", "result": "UPDATED"}]}
        }));
    });

    let csv = "supporterId,firstName,email\ns-1,Ada,ada@example.org\ns-2,Grace,\ns-3,Alan,alan@example.org\n";
    let supporters = supporters_from_delimited(csv.as_bytes(), b',').unwrap();
    let summary = upsert_supporters(&client_for(&server), &supporters, 2).await;

    upsert.assert_hits(2);
    assert_eq!(summary.batches_sent, 2);
    assert_eq!(summary.supporters_sent, 3);
    assert_eq!(summary.results["UPDATED"], 2);
    assert!(summary.interrupted.is_none());
}

#[tokio::test]
async fn test_upsert_stops_on_rejected_batch() {
    let server = MockServer::start();
    let rejected = server.mock(|when, then| {
        when.method(PUT).path("/api/integration/ext/v1/supporters");
        then.status(400)
            .json_body(json!({"errors": [{"message": "too many supporters"}]}));
    });

    let supporters = vec![json!({"supporterId": "s-1"}), json!({"supporterId": "s-2"})];
    let summary = upsert_supporters(&client_for(&server), &supporters, 1).await;

    rejected.assert_hits(1);
    assert_eq!(summary.batches_sent, 0);
    assert!(summary.interrupted.is_some());
}

#[tokio::test]
async fn test_metrics_are_read_from_payload() {
    let server = MockServer::start();
    let metrics_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/integration/ext/v1/metrics")
            .header("authtoken", "test-token");
        then.status(200).json_body(json!({
            "header": {"processingTime": 5},
            "payload": {
                "rateLimit": 1000,
                "maxBatchSize": 20,
                "currentRateLimit": 880,
                "totalAPICalls": 120,
                "supporterRead": 40
            }
        }));
    });

    let metrics = fetch_metrics(&client_for(&server)).await.unwrap();

    metrics_mock.assert();
    assert_eq!(metrics.max_batch_size, Some(20));
    assert!(!metrics.is_rate_limit_low());
    assert!(metrics
        .to_pairs()
        .contains(&("supporterRead".to_string(), "40".to_string())));
}

#[tokio::test]
async fn test_unauthorized_metrics_request_is_an_api_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/integration/ext/v1/metrics");
        then.status(401).body("bad token");
    });

    let err = fetch_metrics(&client_for(&server)).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}
