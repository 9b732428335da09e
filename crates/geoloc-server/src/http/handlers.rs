//! HTTP request handlers for the lookup and maintenance endpoints.

use crate::server::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use geoloc_db::{LookupError, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Query string of `GET /ip`.
#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    /// Address to look up
    pub address: Option<String>,
}

/// Query string of `GET /updatedb`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuery {
    /// `true` (any case) skips every refresh gate
    pub force: Option<String>,
}

/// Body of a successful `GET /updatedb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Whether a new database was installed
    pub update: bool,
    /// Database path
    pub file: String,
    /// Reason reported by the refresh
    pub message: String,
}

/// Handle GET /ip endpoint.
///
/// Returns the city record for `address` wrapped as `{"data": record}`.
///
/// # Errors
///
/// Returns `AppError` if the address is missing or invalid, or the lookup fails.
pub async fn handle_lookup(
    Query(query): Query<LookupQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let address = query
        .address
        .as_deref()
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .ok_or(AppError::MissingAddress)?;

    tracing::debug!("Handling lookup request for address: {}", address);

    let record = state.service().lookup(address)?;
    Ok(Json(json!({ "data": record })).into_response())
}

/// Handle GET /healthz endpoint.
pub async fn handle_healthz() -> Json<serde_json::Value> {
    Json(json!({ "data": "healthz" }))
}

/// Handle GET /readiness endpoint.
///
/// 200 once a database is loaded, 503 before.
pub async fn handle_readiness(State(state): State<Arc<AppState>>) -> Response {
    if state.service().ready() {
        (StatusCode::OK, Json(json!({ "ready": true }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "message": "maxmind database not available" })),
        )
            .into_response()
    }
}

/// Handle GET /updatedb endpoint.
///
/// Runs one refresh bounded by the configured HTTP timeout.
///
/// # Errors
///
/// Returns `AppError` if the refresh fails or does not finish in time.
pub async fn handle_update(
    Query(query): Query<UpdateQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UpdateResponse>, AppError> {
    let force = query
        .force
        .as_deref()
        .is_some_and(|force| force.eq_ignore_ascii_case("true"));
    let timeout = state.update_timeout();

    tracing::debug!("Handling update request (force: {})", force);

    let status = tokio::time::timeout(timeout, state.service().update(force))
        .await
        .map_err(|_| AppError::UpdateTimeout(timeout))??;

    let message = if status.reason.is_empty() {
        if status.updated {
            "database downloaded".to_string()
        } else {
            "database already up to date".to_string()
        }
    } else {
        status.reason
    };

    Ok(Json(UpdateResponse {
        update: status.updated,
        file: state.service().database_path().display().to_string(),
        message,
    }))
}

/// Application-level error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// No address in the query (400)
    MissingAddress,
    /// Lookup failure (400, 404, 503 or 500 depending on the cause)
    Lookup(LookupError),
    /// Refresh failure (400 without a license key, 500 otherwise)
    Update(ServiceError),
    /// Refresh did not finish in time (500)
    UpdateTimeout(Duration),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::MissingAddress => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "missing address parameter" }),
            ),
            Self::Lookup(LookupError::InvalidAddress(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "message": "invalid ip address" }),
            ),
            Self::Lookup(LookupError::DatabaseMissing) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "message": "database not loaded" }),
            ),
            Self::Lookup(err @ LookupError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                json!({ "message": err.to_string() }),
            ),
            Self::Lookup(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": err.to_string() }),
            ),
            Self::Update(err) if err.is_credential_missing() => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "missing maxmind license key" }),
            ),
            Self::Update(err) => {
                tracing::warn!("Database update failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
            Self::UpdateTimeout(timeout) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("database update timed out after {timeout:?}") }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<LookupError> for AppError {
    fn from(err: LookupError) -> Self {
        Self::Lookup(err)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        Self::Update(err)
    }
}
