//! HTTP contract tests for the live API clients and the chat and embedding
//! providers, run against a local mock server: auth headers, request and
//! response bodies, error mapping, and the fabric controller's session-token
//! lifecycle.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use switchboard::embedding::{EmbeddingError, EmbeddingProvider, HttpEmbeddingProvider};
use switchboard::message::Message;
use switchboard::model::{ChatError, ChatModel, ChatRequest, HttpChatModel};
use switchboard::tools::fabric::{FabricClient, SiteSummary, TelemetrySample};
use switchboard::tools::inventory::{InventoryClient, ServerSummary};
use switchboard::tools::{FabricApi, InventoryApi, TelemetryKind, ToolError};

// ===== Inventory service =====

#[tokio::test]
async fn inventory_sends_the_api_key_and_decodes_the_envelope() {
    let server = MockServer::start_async().await;
    let servers = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/inventory/servers")
                .header("authorization", "Bearer test-key");
            then.status(200).json_body(json!({
                "results": [
                    {
                        "name": "rack-01",
                        "model": "UCS C240 M7",
                        "serial": "FCH1234",
                        "powerState": "on",
                        "firmware": "4.2(3a)"
                    },
                    {
                        "name": "rack-02",
                        "model": "UCS C240 M7",
                        "serial": "FCH5678",
                        "powerState": "off",
                        "firmware": "4.3(1b)"
                    }
                ]
            }));
        })
        .await;

    let client = InventoryClient::new(server.base_url(), "test-key");
    let got = client.servers().await.unwrap();

    assert_eq!(
        got,
        vec![
            ServerSummary {
                name: "rack-01".to_string(),
                model: "UCS C240 M7".to_string(),
                serial: "FCH1234".to_string(),
                power_state: "on".to_string(),
                firmware: "4.2(3a)".to_string(),
            },
            ServerSummary {
                name: "rack-02".to_string(),
                model: "UCS C240 M7".to_string(),
                serial: "FCH5678".to_string(),
                power_state: "off".to_string(),
                firmware: "4.3(1b)".to_string(),
            },
        ]
    );
    servers.assert_async().await;
}

#[tokio::test]
async fn inventory_maps_a_rejected_key_to_an_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/inventory/servers");
            then.status(401);
        })
        .await;

    let client = InventoryClient::new(server.base_url(), "wrong-key");
    let err = client.servers().await.unwrap_err();
    assert!(
        matches!(&err, ToolError::Auth(msg) if msg.contains("401")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn inventory_surfaces_server_errors_with_status_and_body() {
    let server = MockServer::start_async().await;
    let alarms = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/inventory/alarms")
                .query_param("state", "active");
            then.status(500).body("backend exploded");
        })
        .await;

    let client = InventoryClient::new(server.base_url(), "test-key");
    let err = client.health_alerts().await.unwrap_err();
    assert!(
        matches!(&err, ToolError::Http { status: 500, message } if message == "backend exploded"),
        "unexpected error: {err}"
    );
    alarms.assert_async().await;
}

#[tokio::test]
async fn unknown_models_have_no_latest_firmware() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/inventory/firmware/latest")
                .query_param("model", "UCSC-C240-M7");
            then.status(200).json_body(json!({"version": "4.3(2b)"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/inventory/firmware/latest")
                .query_param("model", "E110");
            then.status(404);
        })
        .await;

    let client = InventoryClient::new(server.base_url(), "test-key");
    assert_eq!(
        client.latest_firmware("UCSC-C240-M7").await.unwrap(),
        Some("4.3(2b)".to_string())
    );
    assert_eq!(client.latest_firmware("E110").await.unwrap(), None);
}

// ===== Fabric controller =====

fn login_body() -> serde_json::Value {
    json!({"username": "admin", "password": "secret"})
}

#[tokio::test]
async fn fabric_logs_in_once_and_reuses_the_session_token() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/auth/login")
                .json_body(login_body());
            then.status(200).json_body(json!({"token": "tok-1"}));
        })
        .await;
    let sites = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/fabric/sites")
                .header("x-auth-token", "tok-1");
            then.status(200).json_body(json!({
                "results": [{"name": "fra-1", "location": "Frankfurt", "health": "healthy"}]
            }));
        })
        .await;

    let client = FabricClient::new(server.base_url(), "admin", "secret");
    let first = client.sites().await.unwrap();
    let second = client.sites().await.unwrap();

    let expected = vec![SiteSummary {
        name: "fra-1".to_string(),
        location: "Frankfurt".to_string(),
        health: "healthy".to_string(),
    }];
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(login.hits_async().await, 1);
    assert_eq!(sites.hits_async().await, 2);
}

#[tokio::test]
async fn fabric_reestablishes_an_expired_session() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/login");
            then.status(200).json_body(json!({"token": "tok-1"}));
        })
        .await;
    let sites = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/fabric/sites")
                .header("x-auth-token", "tok-1");
            then.status(200).json_body(json!({"results": []}));
        })
        .await;

    // A zero TTL makes every cached token count as already expired.
    let client =
        FabricClient::new(server.base_url(), "admin", "secret").with_token_ttl(Duration::ZERO);
    client.sites().await.unwrap();
    client.sites().await.unwrap();

    assert_eq!(login.hits_async().await, 2);
    assert_eq!(sites.hits_async().await, 2);
}

#[tokio::test]
async fn fabric_retries_a_401_exactly_once_before_giving_up() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/login");
            then.status(200).json_body(json!({"token": "tok-1"}));
        })
        .await;
    let sites = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/fabric/sites");
            then.status(401);
        })
        .await;

    let client = FabricClient::new(server.base_url(), "admin", "secret");
    let err = client.sites().await.unwrap_err();

    assert!(
        matches!(&err, ToolError::Auth(msg) if msg.contains("freshly issued")),
        "unexpected error: {err}"
    );
    // One initial attempt plus one retry with a fresh token, then stop.
    assert_eq!(login.hits_async().await, 2);
    assert_eq!(sites.hits_async().await, 2);
}

#[tokio::test]
async fn fabric_rejected_login_is_an_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/login");
            then.status(403);
        })
        .await;

    let client = FabricClient::new(server.base_url(), "admin", "bad-password");
    let err = client.sites().await.unwrap_err();
    assert!(
        matches!(&err, ToolError::Auth(msg) if msg.contains("403")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn fabric_telemetry_queries_carry_metric_and_window() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/login");
            then.status(200).json_body(json!({"token": "tok-1"}));
        })
        .await;
    let telemetry = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/fabric/telemetry")
                .query_param("metric", "cpu")
                .query_param("window", "1h")
                .header("x-auth-token", "tok-1");
            then.status(200).json_body(json!({
                "results": [{"device": "spine-1", "metric": "cpu", "average": 41.5, "peak": 88.0}]
            }));
        })
        .await;

    let client = FabricClient::new(server.base_url(), "admin", "secret");
    let samples = client.telemetry(TelemetryKind::Cpu).await.unwrap();

    assert_eq!(
        samples,
        vec![TelemetrySample {
            device: "spine-1".to_string(),
            metric: "cpu".to_string(),
            average: 41.5,
            peak: 88.0,
        }]
    );
    telemetry.assert_async().await;
}

// ===== HTTP chat and embedding providers =====

#[tokio::test]
async fn chat_model_posts_the_conversation_and_reads_the_reply() {
    let server = MockServer::start_async().await;
    let completions = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer model-key")
                .json_body(json!({
                    "model": "gpt-test",
                    "messages": [
                        {"role": "system", "content": "Answer about networks."},
                        {"role": "user", "content": "hi"},
                        {"role": "assistant", "content": "hello"},
                        {"role": "user", "content": "how is the fabric?"}
                    ]
                }));
            then.status(200).json_body(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "All spines are healthy."}}
                ]
            }));
        })
        .await;

    let model = HttpChatModel::new(server.base_url(), "model-key", "gpt-test");
    let request = ChatRequest::new("how is the fabric?")
        .with_system("Answer about networks.")
        .with_history(vec![Message::user("hi"), Message::assistant("hello")]);
    let reply = model.complete(&request).await.unwrap();

    assert_eq!(reply, "All spines are healthy.");
    completions.assert_async().await;
}

#[tokio::test]
async fn chat_model_retries_a_server_error_once() {
    let server = MockServer::start_async().await;
    let completions = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503).body("busy");
        })
        .await;

    let model = HttpChatModel::new(server.base_url(), "model-key", "gpt-test");
    let err = model
        .complete_with_retry(&ChatRequest::new("q"))
        .await
        .unwrap_err();

    assert!(
        matches!(&err, ChatError::Http { status: 503, message } if message == "busy"),
        "unexpected error: {err}"
    );
    completions.assert_hits_async(2).await;
}

#[tokio::test]
async fn chat_model_rejects_a_reply_with_no_choices() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        })
        .await;

    let model = HttpChatModel::new(server.base_url(), "model-key", "gpt-test");
    let err = model.complete(&ChatRequest::new("q")).await.unwrap_err();

    assert!(
        matches!(&err, ChatError::MalformedResponse(_)),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn embedding_provider_posts_the_batch_and_reads_vectors() {
    let server = MockServer::start_async().await;
    let embeddings = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/embeddings")
                .header("authorization", "Bearer embed-key")
                .json_body(json!({ "model": "embed-test", "input": ["alpha", "beta"] }));
            then.status(200).json_body(json!({
                "data": [
                    {"embedding": [1.0, 0.0, 0.0]},
                    {"embedding": [0.0, 1.0, 0.0]}
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-key", "embed-test", 3);
    let vectors = provider
        .embed_batch(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    embeddings.assert_async().await;
}

#[tokio::test]
async fn embedding_provider_rejects_a_wrong_width_vector() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200)
                .json_body(json!({ "data": [{"embedding": [1.0, 0.0]}] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-key", "embed-test", 3);
    let err = provider
        .embed_batch(&["alpha".to_string()])
        .await
        .unwrap_err();

    assert!(
        matches!(&err, EmbeddingError::DimensionMismatch { expected: 3, got: 2 }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn embedding_provider_rejects_a_short_batch() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200)
                .json_body(json!({ "data": [{"embedding": [1.0, 0.0, 0.0]}] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(server.base_url(), "embed-key", "embed-test", 3);
    let err = provider
        .embed_batch(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap_err();

    assert!(
        matches!(&err, EmbeddingError::BatchShape { requested: 2, returned: 1 }),
        "unexpected error: {err}"
    );
}
