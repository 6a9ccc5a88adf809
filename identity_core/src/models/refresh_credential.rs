use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::{TenantId, UserId};

/// A signed, server-verifiable refresh token plus the persistent row recording its
/// non-revoked status (spec 3: "RefreshCredential"; glossary: "Refresh credential").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshCredential {
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub token: String,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshCredential {
  /// The validity predicate, authoritative regardless of TTL-index lag (spec 3,
  /// glossary: "revoked_at is null AND expires_at > now").
  pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
    self.revoked_at.is_none() && self.expires_at > now
  }
}
