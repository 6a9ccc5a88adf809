use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::{TenantId, UserId};

/// The value stored in the Session Store under an opaque access token key (spec 3:
/// "Session"). Created with TTL `session_timeout_minutes` at issuance, its TTL is
/// extended on refresh, and it is deleted on logout / purged by the store's TTL.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionBlob {
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub email: Option<String>,
  pub roles: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}
