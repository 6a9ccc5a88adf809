//! HTTP-boundary error type. Maps `identity_core::CoreError` onto the seven
//! external taxonomy values of spec section 7, and carries the storage-driver
//! error conversions that `identity_core` deliberately does not own (it has no
//! `mongodb`/`redis` dependency).

use axum::http::StatusCode;
use axum::response::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use identity_core::error::{CoreError, ErrorMapper, ForbiddenReason};

/// Body shape for every non-2xx response (spec 7: "machine-readable taxonomy
/// value" plus an optional sub-reason).
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOutput {
  pub error: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry_after_seconds: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

impl ErrorOutput {
  fn new(error: &str, message: impl Into<String>) -> Self {
    Self {
      error: error.to_string(),
      message: message.into(),
      retry_after_seconds: None,
      reason: None,
    }
  }
}

#[derive(Error, Debug)]
pub enum AppError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("mongo error: {0}")]
  Mongo(#[from] mongodb::error::Error),

  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("internal error: {0}")]
  Internal(String),
}

/// Recognize a Mongo duplicate-key write error (code 11000) as a conflict; every
/// other storage error is `internal` (spec 7: external taxonomy has no storage
/// detail).
fn mongo_error_to_core(err: &mongodb::error::Error) -> CoreError {
  use mongodb::error::ErrorKind;
  if let ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) = err.kind.as_ref() {
    if we.code == 11000 {
      return CoreError::Conflict("duplicate identifier".to_string());
    }
  }
  CoreError::Internal(err.to_string())
}

impl ErrorMapper for AppError {
  type Error = AppError;

  fn map_error(error: CoreError) -> Self::Error {
    AppError::Core(error)
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let core = match self {
      AppError::Core(c) => c,
      AppError::Mongo(e) => mongo_error_to_core(&e),
      AppError::Redis(e) => CoreError::Internal(e.to_string()),
      AppError::Internal(msg) => CoreError::Internal(msg),
    };

    let (status, error, retry_after_seconds, reason) = match &core {
      CoreError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request", None, None),
      CoreError::Unauthenticated | CoreError::InvalidToken(_) => {
        (StatusCode::UNAUTHORIZED, "unauthenticated", None, None)
      }
      CoreError::Forbidden(reason) => {
        let (retry, sub) = match reason {
          ForbiddenReason::Locked {
            retry_after_seconds,
          } => (Some(*retry_after_seconds), "locked"),
          ForbiddenReason::AccountDeactivated => (None, "account_deactivated"),
          ForbiddenReason::NoTenantAccess => (None, "no_tenant_access"),
          ForbiddenReason::IdentifierTypeNotAllowed => (None, "identifier_type_not_allowed"),
        };
        (StatusCode::FORBIDDEN, "forbidden", retry, Some(sub.to_string()))
      }
      CoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict", None, None),
      CoreError::RateLimited {
        retry_after_seconds,
      } => (
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        Some(*retry_after_seconds),
        None,
      ),
      CoreError::PolicyViolation(_) => (StatusCode::BAD_REQUEST, "policy_violation", None, None),
      CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None, None),
      CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None, None),
    };

    let mut body = ErrorOutput::new(error, core.to_string());
    body.retry_after_seconds = retry_after_seconds;
    body.reason = reason;

    (status, Json(body)).into_response()
  }
}
