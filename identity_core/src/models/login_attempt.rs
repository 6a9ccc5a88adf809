use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::TenantId;

/// An append-only record of a login attempt, TTL 24h at the storage layer (spec 3:
/// "LoginAttempt").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginAttempt {
  pub identifier: String,
  pub tenant_id: TenantId,
  pub ip: Option<String>,
  pub success: bool,
  pub timestamp: DateTime<Utc>,
}
