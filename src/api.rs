//! HTTP API exposing the engine operations as JSON endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::warn;

use crate::delivery::Publisher;
use crate::error::{Error, ValidationError};
use crate::newsletter;
use crate::pipeline::processor::NewsletterEngine;

/// Window used when a request omits `days_back`.
pub const DEFAULT_DAYS_BACK: i64 = 7;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<NewsletterEngine>,
    /// Document store and mailer; either may be unconfigured.
    pub publisher: Publisher,
}

/// Build the Axum router with all engine routes.
pub fn routes(engine: Arc<NewsletterEngine>, publisher: Publisher) -> Router {
    let state = AppState { engine, publisher };

    Router::new()
        .route("/health", get(health))
        .route("/api/channels", get(list_channels))
        .route("/api/mentions/parse", post(parse_mentions))
        .route("/api/channels/{id}/messages", get(channel_messages))
        .route("/api/channels/{id}/important", get(important_messages))
        .route("/api/channels/{id}/topics", get(topics))
        .route("/api/channels/{id}/dates", get(dates))
        .route("/api/newsletter", post(generate_newsletter))
        .with_state(state)
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "Request failed");
        }
        (
            status,
            Json(serde_json::json!({
                "status": "error",
                "kind": self.kind(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

// Malformed query strings and bodies are input errors like any other.

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::InvalidField {
            field: "query",
            reason: rejection.body_text(),
        }
        .into()
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::InvalidField {
            field: "body",
            reason: rejection.body_text(),
        }
        .into()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

/// 200 when the chat source accepts the token, 503 otherwise.
async fn health(State(state): State<AppState>) -> Response {
    let engine = &state.engine;
    let mut body = serde_json::json!({
        "service": "newsletter-engine",
        "source": engine.source_name(),
        "mail_enabled": state.publisher.mailer().is_some(),
        "documents_enabled": state.publisher.documents_enabled(),
    });

    let status = match engine.check_connection().await {
        Ok(identity) => {
            body["status"] = "ok".into();
            body["connected_as"] = serde_json::json!(identity);
            StatusCode::OK
        }
        Err(e) => {
            warn!(source = engine.source_name(), error = %e, "Health check failed");
            body["status"] = "degraded".into();
            body["error"] = serde_json::json!({"kind": e.kind(), "message": e.to_string()});
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, Json(body)).into_response()
}

// ── Engine operations ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WindowQuery {
    days_back: Option<i64>,
}

impl WindowQuery {
    fn days_back(&self) -> i64 {
        self.days_back.unwrap_or(DEFAULT_DAYS_BACK)
    }
}

type WindowParam = Result<Query<WindowQuery>, QueryRejection>;

async fn list_channels(State(state): State<AppState>) -> Result<impl IntoResponse, Error> {
    Ok(Json(state.engine.list_channels().await?))
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    text: Option<String>,
}

async fn parse_mentions(
    State(state): State<AppState>,
    body: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(body) = body?;
    let text = body.text.ok_or(ValidationError::MissingField("text"))?;
    Ok(Json(state.engine.parse_mentions(&text).await))
}

async fn channel_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: WindowParam,
) -> Result<impl IntoResponse, Error> {
    let Query(window) = window?;
    Ok(Json(
        state.engine.get_channel_messages(&id, window.days_back()).await?,
    ))
}

async fn important_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: WindowParam,
) -> Result<impl IntoResponse, Error> {
    let Query(window) = window?;
    Ok(Json(
        state.engine.filter_important(&id, window.days_back()).await?,
    ))
}

async fn topics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: WindowParam,
) -> Result<impl IntoResponse, Error> {
    let Query(window) = window?;
    Ok(Json(
        state.engine.organize_by_topic(&id, window.days_back()).await?,
    ))
}

async fn dates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    window: WindowParam,
) -> Result<impl IntoResponse, Error> {
    let Query(window) = window?;
    Ok(Json(
        state.engine.extract_dates(&id, window.days_back()).await?,
    ))
}

// ── Newsletter ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NewsletterRequest {
    days_back: Option<i64>,
    #[serde(default)]
    send: bool,
}

async fn generate_newsletter(
    State(state): State<AppState>,
    body: Result<Json<NewsletterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(body) = body?;
    state.publisher.ensure_can_send(body.send)?;

    let days_back = body.days_back.unwrap_or(DEFAULT_DAYS_BACK);
    let report = state.engine.generate_newsletter(days_back).await?;
    let subject = newsletter::subject(&report);
    let text = newsletter::render(&report);
    let delivery = state
        .publisher
        .deliver(&report, &subject, &text, body.send)
        .await;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "report": report,
            "subject": subject,
            "newsletter": text,
            "delivery": delivery,
        })),
    ))
}
