//! HTTP sidecar surface.
//!
//! | Route | Method | Body | Response |
//! |-------|--------|------|----------|
//! | `/create` | POST | `[PodCreateRequest]` | text |
//! | `/delete` | POST, DELETE | `PodReference` | text |
//! | `/status` | POST, GET | `[PodReference]` | `[PodStatus]` |
//! | `/getLogs` | POST, GET | `LogRequest` | raw bytes |
//! | `/health` | GET | | `ok` |
//!
//! Bodies are decoded here rather than by the `Json` extractor so that every
//! malformed request maps to 400 like any other validation failure.
//!
//! Create and delete run on their own task. A client that disconnects or
//! times out mid-request does not cancel them, so the runtime and the
//! tracker never disagree about a pod.

use crate::error::Error;
use crate::pod::{LogRequest, PodCreateRequest, PodReference};
use crate::provider::Provider;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Builds the sidecar router.
pub fn router(provider: Arc<Provider>) -> Router {
    Router::new()
        .route("/create", post(create))
        .route("/delete", post(delete).delete(delete))
        .route("/status", post(status).get(status))
        .route("/getLogs", post(get_logs).get(get_logs))
        .route("/health", get(health))
        .with_state(provider)
}

/// Error response: status code from the error kind, error text as body.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "request rejected");
        }
        (status, self.0.to_string()).into_response()
    }
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError(Error::Validation(e.to_string())))
}

/// Runs `operation` to completion on a separate task, even if the request
/// future is dropped.
async fn run_detached<T, F>(operation: F) -> Result<T, ApiError>
where
    F: Future<Output = crate::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(operation).await {
        Ok(result) => Ok(result?),
        Err(e) => Err(ApiError(Error::Internal(format!("request task failed: {e}")))),
    }
}

async fn create(
    State(provider): State<Arc<Provider>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let requests: Vec<PodCreateRequest> = decode(&body)?;
    run_detached(async move { provider.create_pods(requests).await }).await
}

async fn delete(
    State(provider): State<Arc<Provider>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let reference: PodReference = decode(&body)?;
    run_detached(async move { provider.delete_pod(reference).await }).await
}

async fn status(
    State(provider): State<Arc<Provider>>,
    body: Bytes,
) -> Result<Json<Vec<crate::pod::PodStatus>>, ApiError> {
    let references: Vec<PodReference> = decode(&body)?;
    Ok(Json(provider.get_statuses(references).await?))
}

async fn get_logs(
    State(provider): State<Arc<Provider>>,
    body: Bytes,
) -> Result<Vec<u8>, ApiError> {
    let request: LogRequest = decode(&body)?;
    Ok(provider.get_logs(request).await?)
}

async fn health() -> &'static str {
    "ok"
}
