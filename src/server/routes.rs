//! Route handlers.

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use super::AppState;
use crate::error::DocentError;

/// Header carrying the caller's session id.
pub const SESSION_HEADER: &str = "x-user";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/stream-query", post(stream_query))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
}

/// JSON error body `{ "error": .. }`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DocentError> for ApiError {
    fn from(error: DocentError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Session id and query text, validated before anything else runs.
fn parse_request(headers: &HeaderMap, body: &Bytes) -> Result<(String, String), ApiError> {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing X-User header"))?
        .to_string();

    let request: QueryRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    Ok((session_id, query.to_string()))
}

async fn liveness() -> &'static str {
    "docent is running"
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions().len(),
        "toolChannel": state.channel.state(),
        "indexLoaded": state.index.is_loaded(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<String>, ApiError> {
    let (session_id, text) = parse_request(&headers, &body)?;
    let span = info_span!("query", request_id = %Uuid::new_v4(), session_id = %session_id);

    let answer = state
        .dispatcher
        .query(&session_id, &text)
        .instrument(span)
        .await
        .map_err(|e| {
            warn!(session_id = %session_id, error = %e, "query failed");
            ApiError::from(e)
        })?;

    Ok(Json(answer))
}

async fn stream_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let (session_id, text) = parse_request(&headers, &body)?;
    let span = info_span!("stream_query", request_id = %Uuid::new_v4(), session_id = %session_id);

    let mut fragments = state
        .dispatcher
        .stream_query(&session_id, &text)
        .instrument(span.clone())
        .await?;

    // Failures before anything was sent still get a proper status code.
    let first = fragments.next().instrument(span.clone()).await;
    if let Some(Err(e)) = first {
        warn!(session_id = %session_id, error = %e, "streamed query failed before first fragment");
        return Err(ApiError::from(e));
    }

    let events = async_stream::stream! {
        let mut next = first;
        while let Some(item) = next {
            yield Ok::<_, Infallible>(span.in_scope(|| fragment_event(item)));
            next = fragments.next().instrument(span.clone()).await;
        }
    };

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn fragment_event(item: Result<String, DocentError>) -> Event {
    match item {
        Ok(fragment) => Event::default().data(normalize_newlines(&fragment)),
        Err(e) => {
            warn!(error = %e, "streamed query failed mid-stream");
            Event::default()
                .event("error")
                .data(normalize_newlines(&e.to_string()))
        }
    }
}

/// SSE data lines cannot carry carriage returns.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
