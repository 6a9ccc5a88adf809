use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::TenantId;
use crate::models::user::IdentifierKind;

/// An isolated customer namespace. Externally provisioned; membership gates all
/// access to it (spec 3: "Tenant").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
  pub tenant_id: TenantId,
  pub name: String,
  pub is_active: bool,
}

/// Per-tenant login policy. `GetTenantLoginConfig` returns `TenantLoginConfig::default_sentinel()`
/// when no row exists for the tenant — it never fails with not-found (spec 4.B).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantLoginConfig {
  pub tenant_id: TenantId,
  pub allowed_identifiers: Vec<IdentifierKind>,
  pub require_2fa: bool,
  pub allow_registration: bool,
  pub min_length: usize,
  pub require_upper: bool,
  pub require_lower: bool,
  pub require_digit: bool,
  pub require_special: bool,
  pub session_timeout_minutes: i64,
  pub max_login_attempts: u32,
  pub lockout_duration_minutes: i64,
  pub branding: Option<TenantBranding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantBranding {
  pub display_name: Option<String>,
  pub logo_url: Option<String>,
}

impl TenantLoginConfig {
  /// The well-known sentinel config returned when no row exists for a tenant
  /// (spec 3: "Default: returned when no row exists; a well-known sentinel config
  /// MUST be supplied by the resolver").
  pub fn default_sentinel(tenant_id: TenantId) -> Self {
    Self {
      tenant_id,
      allowed_identifiers: vec![
        IdentifierKind::Email,
        IdentifierKind::Username,
        IdentifierKind::Phone,
        IdentifierKind::DocNumber,
      ],
      require_2fa: false,
      allow_registration: true,
      min_length: 8,
      require_upper: false,
      require_lower: false,
      require_digit: false,
      require_special: false,
      session_timeout_minutes: 30,
      max_login_attempts: 5,
      lockout_duration_minutes: 15,
      branding: None,
    }
  }
}

/// The authoritative record that a user may act within a tenant, plus the roles
/// granted (spec 3: "UserTenantMembership"). At most one active row per
/// (user_id, tenant_id).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserTenantMembership {
  pub user_id: crate::models::ids::UserId,
  pub tenant_id: TenantId,
  pub roles: Vec<String>,
  pub is_active: bool,
  pub joined_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}
