//! eventdb-rest - REST surface of the event history service.
//!
//! Single route: `GET /appevents/{app_id}` returns the application's event
//! history, served from the cache when it is authoritative and loaded through
//! from the store otherwise.

pub mod service;

pub use service::{EventService, ServiceError};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use eventdb_core::{EventCache, EventRecord, EventStore};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

/// Shared state of the query handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<EventCache>,
    pub store: Arc<dyn EventStore>,
    /// Service-wide cancellation, inherited by store reads so in-flight
    /// queries abort on shutdown.
    pub cancel: CancellationToken,
}

/// Successful query body. `Events` is `null` when the application has no
/// persisted events.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(rename = "Events")]
    pub events: Option<Vec<EventRecord>>,
}

/// The only user-visible error shape.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "Message")]
    pub message: String,
}

/// Build the query service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/appevents", get(missing_app_id))
        .route("/appevents/{app_id}", get(app_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn missing_app_id() -> Response {
    error_response("application id is undefined")
}

async fn app_events(State(state): State<AppState>, Path(app_id): Path<String>) -> Response {
    if app_id.is_empty() {
        return error_response("application id is undefined");
    }

    if let Some(events) = state.cache.events_for(&app_id) {
        return ok_response(Some(events));
    }

    tracing::info!(app_id = %app_id, "fetching events from backend storage for application");
    match state.store.events_for_app(&app_id, &state.cancel).await {
        Err(err) => {
            tracing::error!(error = %err, "could not retrieve events from backend storage");
            error_response(&format!(
                "ERROR: Could not retrieve events from backend storage: {err}"
            ))
        }
        Ok(events) if events.is_empty() => {
            tracing::info!(app_id = %app_id, "no events for application");
            ok_response(None)
        }
        Ok(events) => {
            state.cache.add_events(&app_id, events.clone());
            state.cache.set_full_history(&app_id);
            ok_response(Some(events))
        }
    }
}

fn ok_response(events: Option<Vec<EventRecord>>) -> Response {
    json_response(StatusCode::OK, &QueryResponse { events })
}

fn error_response(message: &str) -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        &ErrorResponse {
            message: message.to_string(),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_string(body) {
        Ok(payload) => {
            (status, [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)], payload).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "could not marshal the response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
