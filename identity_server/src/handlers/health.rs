//! Liveness/readiness handlers (spec 6: `/health`, `/ready`). `/health` never
//! touches a backing store: it only proves the process is scheduled and serving.
//! `/ready` pings the Credential Store and the Session Store and fails if either
//! is unreachable.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
  pub status: &'static str,
}

pub async fn health_handler() -> Json<HealthStatus> {
  Json(HealthStatus { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct ReadinessStatus {
  pub status: &'static str,
  pub mongo: &'static str,
  pub redis: &'static str,
}

pub async fn ready_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
  let mongo_ok = state.credential_store.ping().await.is_ok();
  let redis_ok = state.session_store.ping().await.is_ok();

  let body = ReadinessStatus {
    status: if mongo_ok && redis_ok { "ready" } else { "not_ready" },
    mongo: if mongo_ok { "up" } else { "down" },
    redis: if redis_ok { "up" } else { "down" },
  };

  if mongo_ok && redis_ok {
    Ok(Json(body))
  } else {
    tracing::warn!(mongo_ok, redis_ok, "readiness check failed");
    Err(AppError::Internal("dependency unavailable".to_string()))
  }
}
