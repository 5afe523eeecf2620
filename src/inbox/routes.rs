//! REST endpoints for the support inbox.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use super::service::InboxService;
use crate::error::InboxError;
use crate::store::MessageFilter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub inbox: Arc<InboxService>,
}

/// Build the Axum router with health and message routes.
pub fn inbox_routes(inbox: Arc<InboxService>) -> Router {
    let state = AppState { inbox };

    Router::new()
        .route("/health", get(health))
        .route("/api/messages", get(list_messages).post(create_message))
        .route("/api/messages/search", get(search_messages))
        .route("/api/messages/customer/{customer_id}", get(get_conversation))
        .route("/api/messages/{id}", get(get_message))
        .route("/api/messages/{id}/claim", post(claim_message))
        .route("/api/messages/{id}/reply", post(reply_to_message))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

impl IntoResponse for InboxError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            InboxError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({"error": msg}))
            }
            InboxError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({"error": msg})),
            InboxError::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({"error": msg})),
            InboxError::AlreadyClaimed { assigned_agent } => (
                StatusCode::CONFLICT,
                serde_json::json!({
                    "error": self.to_string(),
                    "assignedAgent": assigned_agent,
                }),
            ),
            InboxError::Database(e) => {
                error!(error = %e, "Inbox request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"error": "Internal server error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body. Any extractor rejection becomes a JSON 400 carrying `message`.
fn json_body<T>(body: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, InboxError> {
    body.map(|Json(body)| body).map_err(|rejection| {
        debug!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Rejected request body"
        );
        InboxError::Validation(message.into())
    })
}

/// Lenient numeric query parsing: anything unparsable is treated as absent.
fn parse_param<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Listings ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
    q: Option<String>,
    customer_id: Option<String>,
}

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, InboxError> {
    let page = state.inbox.page(
        parse_param(query.page.as_deref()),
        parse_param(query.limit.as_deref()),
    );
    Ok(Json(state.inbox.inbox(page).await?))
}

async fn search_messages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, InboxError> {
    let page = state.inbox.page(
        parse_param(query.page.as_deref()),
        parse_param(query.limit.as_deref()),
    );
    let filter = MessageFilter {
        query: query.q.filter(|q| !q.is_empty()),
        customer_id: parse_param(query.customer_id.as_deref()),
    };
    Ok(Json(state.inbox.search(&filter, page).await?))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, InboxError> {
    Ok(Json(state.inbox.message(&id).await?))
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<impl IntoResponse, InboxError> {
    let customer_id: i64 = parse_param(Some(customer_id.as_str()))
        .ok_or_else(|| InboxError::Validation("Invalid customerId".into()))?;
    Ok(Json(state.inbox.conversation(customer_id).await?))
}

// ── Writes ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest {
    customer_id: Option<i64>,
    content: Option<String>,
}

async fn create_message(
    State(state): State<AppState>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InboxError> {
    let body = json_body(body, "customerId and content required")?;
    let (Some(customer_id), Some(content)) = (body.customer_id, body.content) else {
        return Err(InboxError::Validation(
            "customerId and content required".into(),
        ));
    };
    let message = state
        .inbox
        .ingest_customer_message(customer_id, &content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    agent: Option<String>,
}

async fn claim_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InboxError> {
    let body = json_body(body, "Agent name is required")?;
    let agent = body.agent.unwrap_or_default();
    Ok(Json(state.inbox.claim(&id, &agent).await?))
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    content: Option<String>,
}

async fn reply_to_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InboxError> {
    let body = json_body(body, "Reply content is required")?;
    let content = body.content.unwrap_or_default();
    let reply = state.inbox.reply(&id, &content).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}
