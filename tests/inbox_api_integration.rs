//! Integration tests for the inbox REST API.
//!
//! Each test spins up an Axum server on a random port backed by an in-memory
//! libSQL database, and exercises the real HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use support_inbox::config::PageConfig;
use support_inbox::inbox::{InboxService, inbox_routes};
use support_inbox::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let inbox = Arc::new(InboxService::new(db, PageConfig::default()));
    let app = inbox_routes(inbox);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

/// POST a customer message and return the created JSON.
async fn post_message(client: &reqwest::Client, base: &str, customer_id: i64, content: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/messages"))
        .json(&json!({"customerId": customer_id, "content": content}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

// ── Ingestion ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_message_stores_priority() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let body = post_message(
            &client,
            &base,
            101,
            "My loan disbursement failed again, any update? urgent",
        )
        .await;

        assert_eq!(body["customerId"], 101);
        assert_eq!(body["senderType"], "CUSTOMER");
        assert_eq!(body["priority"], "HIGH");
        assert_eq!(body["priorityScore"], 10);
        let reason = body["priorityReason"].as_str().unwrap();
        assert!(reason.starts_with("Blocker detected: \"loan disbursement\""));
        assert!(reason.ends_with("Direct question asked"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_message_missing_fields_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/messages"))
            .json(&json!({"content": "no customer"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "customerId and content required");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_bodies_return_json_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        // Wrong field type.
        let resp = client
            .post(format!("{base}/api/messages"))
            .json(&json!({"customerId": "12", "content": "hi"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "customerId and content required");

        // Not JSON at all.
        let resp = client
            .post(format!("{base}/api/messages"))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "customerId and content required");

        // No content type.
        let resp = client
            .post(format!("{base}/api/messages"))
            .body(r#"{"customerId": 1, "content": "hi"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "customerId and content required");

        // Nothing was stored.
        let body: Value = reqwest::get(format!("{base}/api/messages"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_claim_and_reply_bodies_return_json_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let created = post_message(&client, &base, 1, "hi").await;
        let id = created["id"].as_str().unwrap();

        let resp = client
            .post(format!("{base}/api/messages/{id}/claim"))
            .json(&json!({"agent": 42}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Agent name is required");

        let resp = client
            .post(format!("{base}/api/messages/{id}/reply"))
            .header("content-type", "application/json")
            .body("{")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Reply content is required");
    })
    .await
    .expect("test timed out");
}

// ── Inbox listing ────────────────────────────────────────────────────

#[tokio::test]
async fn inbox_is_ordered_by_score() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        post_message(&client, &base, 1, "thanks for the help").await;
        post_message(&client, &base, 2, "payment failed and loan rejected").await;
        post_message(&client, &base, 3, "status update approval").await;

        let resp = reqwest::get(format!("{base}/api/messages")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();

        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 20);
        assert_eq!(body["total"], 3);
        let scores: Vec<i64> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["priorityScore"].as_i64().unwrap())
            .collect();
        assert_eq!(scores, vec![7, 3, 1]);
        assert_eq!(body["messages"][0]["customer"]["id"], 2);
        assert!(body["messages"][0]["customer"]["assignedAgent"].is_null());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn inbox_paging_ignores_garbage_params() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        for i in 0..3 {
            post_message(&client, &base, 1, &format!("hello {i}")).await;
        }

        let body: Value = reqwest::get(format!("{base}/api/messages?page=2&limit=2"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["page"], 2);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);

        let body: Value = reqwest::get(format!("{base}/api/messages?page=abc&limit=-5"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 20);
        assert_eq!(body["total"], 3);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn search_filters_by_text_and_customer() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        post_message(&client, &base, 1, "Where is my Refund").await;
        post_message(&client, &base, 2, "refund not processed").await;
        post_message(&client, &base, 2, "hello").await;

        let body: Value = reqwest::get(format!("{base}/api/messages/search?q=refund"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["total"], 2);

        let body: Value =
            reqwest::get(format!("{base}/api/messages/search?q=refund&customerId=2"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["messages"][0]["content"], "refund not processed");
    })
    .await
    .expect("test timed out");
}

// ── Detail ───────────────────────────────────────────────────────────

#[tokio::test]
async fn get_message_by_id() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let created = post_message(&client, &base, 5, "blocked").await;
        let id = created["id"].as_str().unwrap();

        let resp = reqwest::get(format!("{base}/api/messages/{id}")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], id);
        assert_eq!(body["priorityScore"], 4);
        assert_eq!(body["customer"]["id"], 5);

        let resp = reqwest::get(format!("{base}/api/messages/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Claim / Reply ────────────────────────────────────────────────────

#[tokio::test]
async fn claim_then_reply_flow() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let created = post_message(&client, &base, 9, "money not received").await;
        let id = created["id"].as_str().unwrap();

        // Reply before claim is rejected.
        let resp = client
            .post(format!("{base}/api/messages/{id}/reply"))
            .json(&json!({"content": "Looking into it"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Customer must be claimed before replying");

        // Claim.
        let resp = client
            .post(format!("{base}/api/messages/{id}/claim"))
            .json(&json!({"agent": "dana"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["id"], 9);
        assert_eq!(body["assignedAgent"], "dana");

        // Second claim conflicts and names the owner.
        let resp = client
            .post(format!("{base}/api/messages/{id}/claim"))
            .json(&json!({"agent": "sam"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Customer already claimed");
        assert_eq!(body["assignedAgent"], "dana");

        // Reply now succeeds and is scored.
        let resp = client
            .post(format!("{base}/api/messages/{id}/reply"))
            .json(&json!({"content": "Looking into it"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["senderType"], "AGENT");
        assert_eq!(body["customerId"], 9);
        assert_eq!(body["priorityScore"], 1);
        assert_eq!(body["priorityReason"], "");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn claim_without_agent_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let created = post_message(&client, &base, 1, "hi").await;
        let id = created["id"].as_str().unwrap();

        let resp = client
            .post(format!("{base}/api/messages/{id}/claim"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reply_to_missing_message_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/messages/nope/reply"))
            .json(&json!({"content": "hello"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── Conversation ─────────────────────────────────────────────────────

#[tokio::test]
async fn conversation_view() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let first = post_message(&client, &base, 42, "account blocked, urgent").await;
        post_message(&client, &base, 42, "hello?").await;
        post_message(&client, &base, 43, "other customer").await;

        let body: Value = reqwest::get(format!("{base}/api/messages/customer/42"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["customer"]["id"], 42);
        assert_eq!(body["customer"]["totalMessages"], 2);
        assert_eq!(body["customer"]["highPriorityCount"], 1);
        assert!(body["customer"]["assignedAgent"].is_null());

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["id"], first["id"]);
        assert_eq!(messages[0]["senderType"], "CUSTOMER");
        assert!(messages[0].get("priorityScore").is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conversation_unknown_and_invalid_customer() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;

        let resp = reqwest::get(format!("{base}/api/messages/customer/777"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["customer"]["totalMessages"], 0);
        assert!(body["messages"].as_array().unwrap().is_empty());

        let resp = reqwest::get(format!("{base}/api/messages/customer/not-a-number"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid customerId");
    })
    .await
    .expect("test timed out");
}
