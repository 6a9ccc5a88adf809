//! The Permission Resolver contract (spec 4.D): expand (user, tenant) into a
//! permission set through a two-level cache, then evaluate requests against it.
//! Grounded on the resolver/cache-layer split of a role-based access control crate
//! in the retrieval pack, generalized here to an explicit two-level composition
//! (L1 process-local, L2 shared) instead of a single opaque cache layer.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::ids::{TenantId, UserId};
use crate::models::permission::{check_all_permissions, check_any_permission, check_permission};

/// One cache layer in the L1/L2 composition. `insert` always carries the TTL so
/// L1 and L2 can independently expire even if they disagree on `now` (spec 4.D:
/// "L1 ≤ L2 ≤ 5 minutes").
#[async_trait]
pub trait PermissionCache: Send + Sync {
  async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> Option<Vec<String>>;
  async fn insert(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    permissions: Vec<String>,
    ttl_secs: i64,
  );
  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId);
  /// Invalidate every entry for a tenant. SHOULD be implemented (spec 4.D); a cache
  /// layer that can't support pattern invalidation may no-op and rely on TTL.
  async fn invalidate_tenant(&self, tenant_id: &TenantId);
}

#[derive(Debug, Clone, Default)]
pub struct PermissionResolution {
  pub permissions: Vec<String>,
  pub cache_hit: bool,
}

#[async_trait]
pub trait PermissionResolver: Send + Sync {
  /// L1 lookup, then L2 lookup, then load-from-store-and-populate-both on a full
  /// miss (spec 4.D resolution algorithm, step 1).
  async fn resolve_permissions(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<PermissionResolution, CoreError>;

  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId);
  async fn invalidate_tenant(&self, tenant_id: &TenantId);

  async fn check_permission(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    required: &str,
  ) -> Result<bool, CoreError> {
    let resolved = self.resolve_permissions(user_id, tenant_id).await?;
    Ok(check_permission(&resolved.permissions, required))
  }

  async fn check_all_permissions(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    required: &[String],
  ) -> Result<bool, CoreError> {
    let resolved = self.resolve_permissions(user_id, tenant_id).await?;
    Ok(check_all_permissions(&resolved.permissions, required))
  }

  async fn check_any_permission(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    required: &[String],
  ) -> Result<bool, CoreError> {
    let resolved = self.resolve_permissions(user_id, tenant_id).await?;
    Ok(check_any_permission(&resolved.permissions, required))
  }
}
