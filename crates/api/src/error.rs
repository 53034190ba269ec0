use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use modelgen_core::error::CoreError;
use modelgen_core::generation::{FailureKind, GenerationFailure};
use modelgen_ledger::LedgerError;
use serde_json::json;
use uuid::Uuid;

/// Application-level error type for HTTP handlers.
///
/// Every variant renders as
/// `{ "success": false, "error": <message>, "details": <raw>, "code": <CODE> }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The user service could not be reached or answered badly.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Malformed request (multipart, form fields).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A generation ran and ended `FAILED`.
    #[error("Generation {generation_id} failed: {}", failure.details)]
    GenerationFailed {
        generation_id: Uuid,
        failure: GenerationFailure,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut generation_id = None;
        let (status, code, message, details) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                    core.to_string(),
                ),
                CoreError::Unauthorized(msg) => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    msg.clone(),
                    core.to_string(),
                ),
                CoreError::InsufficientCredit(msg) => (
                    StatusCode::PAYMENT_REQUIRED,
                    "INSUFFICIENT_CREDIT",
                    "Insufficient credit".to_string(),
                    msg.clone(),
                ),
                CoreError::InvalidTransition { .. }
                | CoreError::Conflict(_)
                | CoreError::Internal(_) => {
                    tracing::error!(error = %core, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        core.to_string(),
                    )
                }
            },

            AppError::Ledger(err) => {
                tracing::error!(error = %err, "User service error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "USER_SERVICE_ERROR",
                    "User service unavailable".to_string(),
                    err.to_string(),
                )
            }

            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                self.to_string(),
            ),

            AppError::GenerationFailed {
                generation_id: id,
                failure,
            } => {
                generation_id = Some(id.to_string());
                let code = match failure.kind {
                    FailureKind::Input => "INPUT_ERROR",
                    FailureKind::Composition => "COMPOSITION_ERROR",
                    FailureKind::Provider => "PROVIDER_ERROR",
                    FailureKind::Storage => "STORAGE_ERROR",
                    FailureKind::Internal => "INTERNAL_ERROR",
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    failure.message.clone(),
                    failure.details.clone(),
                )
            }

            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    msg.clone(),
                )
            }
        };

        let mut body = json!({
            "success": false,
            "error": message,
            "details": details,
            "code": code,
        });
        if let Some(id) = generation_id {
            body["generationId"] = id.into();
        }

        (status, axum::Json(body)).into_response()
    }
}
