use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::{RoleId, TenantId};

/// A named bundle of permission strings. `tenant_id = None` means system-wide: a
/// permission lookup for a membership considers roles whose `tenant_id` equals the
/// membership's tenant OR is unset (spec 3: "Role").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
  pub id: RoleId,
  pub name: String,
  pub tenant_id: Option<TenantId>,
  pub permissions: Vec<String>,
  pub is_system: bool,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Role {
  /// Whether this role applies to a membership scoped to `tenant`: its own tenant
  /// matches, or it is a system-wide (tenant-less) role.
  pub fn applies_to(&self, tenant: &TenantId) -> bool {
    match &self.tenant_id {
      Some(t) => t == tenant,
      None => true,
    }
  }
}
