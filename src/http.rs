//! HTTP surface over an outbox store.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /outbox` accepts `{ "message_type": ..., "payload": <json> }` and
//!   runs the new record through the intake pipeline, which saves it.
//!   A string payload is stored verbatim; any other JSON value is stored as
//!   its JSON text.
//! - `GET /outbox` lists records, optionally filtered with `?status=Pending`.
//! - `GET /outbox/:id` fetches one record.
//! - `GET /health` returns `{ "ok": true, "pending": n, "completed": n, "failed": n }`.
//!
//! Record payloads appear base64-encoded in responses.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use outbox_pipeline::{http, InMemoryOutboxStore};
//!
//! let api = Arc::new(http::OutboxApi::new(InMemoryOutboxStore::new()));
//! http::serve(api, "0.0.0.0:3000").await?;
//! ```

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use crate::outbox::{OutboxRecord, OutboxStatus};
use crate::pipeline::{Pipeline, PipelineError, SaveStep};
use crate::store::{OutboxStore, OutboxStoreExt, StoreError};

#[derive(Deserialize)]
struct PublishRequest {
    message_type: String,
    payload: Value,
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<String>,
}

/// Shared state behind the routes: the store to query and the pipeline new
/// records go through.
pub struct OutboxApi<S> {
    store: S,
    intake: Pipeline<OutboxRecord>,
}

impl<S: OutboxStore + Clone + 'static> OutboxApi<S> {
    /// Intake that only saves the record.
    pub fn new(store: S) -> Self {
        let intake = Pipeline::builder().step(SaveStep::new(store.clone())).build();
        OutboxApi { store, intake }
    }

    /// Use a custom intake pipeline. It is responsible for persisting the
    /// record, normally by ending with a [`SaveStep`].
    pub fn with_intake(store: S, intake: Pipeline<OutboxRecord>) -> Self {
        OutboxApi { store, intake }
    }

    /// The store queried by the read routes.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Build an axum `Router` over the given API state.
pub fn router<S: OutboxStore + 'static>(api: Arc<OutboxApi<S>>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .route("/outbox", get(list_handler::<S>).post(publish_handler::<S>))
        .route("/outbox/:id", get(get_handler::<S>))
        .with_state(api)
}

/// Serve the outbox API at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve<S: OutboxStore + 'static>(
    api: Arc<OutboxApi<S>>,
    addr: &str,
) -> Result<(), std::io::Error> {
    let app = router(api);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_handler<S: OutboxStore + 'static>(
    State(api): State<Arc<OutboxApi<S>>>,
) -> Response {
    match status_counts(&api.store) {
        Ok((pending, completed, failed)) => Json(json!({
            "ok": true,
            "pending": pending,
            "completed": completed,
            "failed": failed,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Outbox health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn publish_handler<S: OutboxStore + 'static>(
    State(api): State<Arc<OutboxApi<S>>>,
    Json(request): Json<PublishRequest>,
) -> Response {
    if request.message_type.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message_type must not be empty");
    }

    let payload = match request.payload {
        Value::String(text) => text.into_bytes(),
        other => other.to_string().into_bytes(),
    };
    let record = OutboxRecord::new(request.message_type, payload);

    match api.intake.process(&record) {
        Ok(()) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) if is_store_failure(&e) => {
            error!(record_id = %record.id, message_type = %record.message_type, error = %e, "Publish over HTTP failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => {
            warn!(message_type = %record.message_type, step = e.step, error = %e, "Message rejected by intake");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.reason())
        }
    }
}

fn is_store_failure(err: &PipelineError) -> bool {
    std::error::Error::source(&err.source)
        .is_some_and(|source| source.is::<StoreError>())
}

async fn list_handler<S: OutboxStore + 'static>(
    State(api): State<Arc<OutboxApi<S>>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let status = match query.status.as_deref().map(OutboxStatus::parse) {
        None => None,
        Some(Some(status)) => Some(status),
        Some(None) => return error_response(StatusCode::BAD_REQUEST, "unknown status"),
    };

    match api.store.list(status) {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn get_handler<S: OutboxStore + 'static>(
    State(api): State<Arc<OutboxApi<S>>>,
    Path(id): Path<Uuid>,
) -> Response {
    match api.store.record(id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, &format!("no outbox record {id}")),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn status_counts<S: OutboxStore>(store: &S) -> Result<(usize, usize, usize), StoreError> {
    Ok((
        store.count_by_status(OutboxStatus::Pending)?,
        store.count_by_status(OutboxStatus::Completed)?,
        store.count_by_status(OutboxStatus::Failed)?,
    ))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
