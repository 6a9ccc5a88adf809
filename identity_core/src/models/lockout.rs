use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::{TenantId, UserId};

/// A time-bounded forbidden state for (user, tenant), triggered by consecutive
/// failed logins (spec 3: "UserLockout"). While an active row exists with
/// `unlock_at > now`, all login attempts for that pair fail with `locked`,
/// bypassing the password check entirely.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserLockout {
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub locked_at: DateTime<Utc>,
  pub unlock_at: DateTime<Utc>,
  pub reason: String,
  pub is_active: bool,
}

impl UserLockout {
  pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
    self.is_active && self.unlock_at > now
  }
}
