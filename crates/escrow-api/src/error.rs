//! Maps `OrchestratorError` (§7) to the `{statusCode, message}` JSON
//! shape §6 promises every failed call: "every failed API call returns
//! `{statusCode, message}` and never partial state."

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use escrow_core::error::OrchestratorError;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
}

/// Newtype so this crate can impl `IntoResponse` for a foreign error type.
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.kind.http_status();
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // `AlreadyExists` on CreatePurchase carries the pre-existing id so
        // an idempotent client can resume with it (§4.3, §7).
        let body = if let Some(existing_id) = self.0.existing_id {
            json!({ "statusCode": status.as_u16(), "message": self.0.message, "existingId": existing_id })
        } else {
            json!(ErrorBody { status_code: status.as_u16(), message: self.0.message })
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
