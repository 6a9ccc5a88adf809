//! The Credential Store contract (spec 4.B). One production implementation lives in
//! `identity_server` over `mongodb::Client`; an in-memory fake is provided for tests
//! that exercise the Login State Machine without a real database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::ids::{RoleId, TenantId, UserId};
use crate::models::lockout::UserLockout;
use crate::models::login_attempt::LoginAttempt;
use crate::models::oauth_account::OAuthAccount;
use crate::models::refresh_credential::RefreshCredential;
use crate::models::role::Role;
use crate::models::tenant::{TenantLoginConfig, UserTenantMembership};
use crate::models::user::{NewUser, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
  async fn create_user(&self, user: &NewUser) -> Result<User, CoreError>;
  async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, CoreError>;
  async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError>;
  async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), CoreError>;
  async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), CoreError>;

  /// Idempotent on (user, tenant): if an active row exists, replace its roles; if
  /// inactive, reactivate with the given roles (spec 4.B).
  async fn add_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<UserTenantMembership, CoreError>;
  async fn find_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserTenantMembership>, CoreError>;
  async fn deactivate_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<(), CoreError>;
  async fn update_membership_roles(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<(), CoreError>;

  /// Roles whose tenant matches `tenant_id` OR is unset (spec 4.B: "MUST use the
  /// compound (name, tenant_id) index").
  async fn find_roles_by_names(
    &self,
    names: &[String],
    tenant_id: &TenantId,
  ) -> Result<Vec<Role>, CoreError>;
  async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, CoreError>;

  /// Union over the role permissions, de-duplicated (spec 4.B).
  async fn aggregate_permissions(
    &self,
    roles: &[String],
    tenant_id: &TenantId,
  ) -> Result<Vec<String>, CoreError> {
    let role_rows = self.find_roles_by_names(roles, tenant_id).await?;
    let mut out = std::collections::BTreeSet::new();
    for role in role_rows {
      out.extend(role.permissions);
    }
    Ok(out.into_iter().collect())
  }

  async fn create_refresh_credential(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    token: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<RefreshCredential, CoreError>;
  /// MUST enforce the validity predicate at the storage layer (spec 4.B): only
  /// returns a row when `revoked_at is null AND expires_at > now`.
  async fn find_valid_refresh_credential(
    &self,
    token: &str,
  ) -> Result<Option<RefreshCredential>, CoreError>;
  async fn revoke_refresh_credential(&self, token: &str) -> Result<(), CoreError>;
  async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError>;
  /// Revoke every active refresh credential for a single (user, tenant) pair —
  /// the scope logout actually needs (spec 4.F: "the corresponding refresh
  /// credential... located from the session's (user, tenant)"), unlike
  /// `revoke_all_for_user` which reaches across every tenant the user belongs to.
  async fn revoke_for_tenant(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<(), CoreError>;
  async fn count_active_for_user(&self, user_id: &UserId) -> Result<u64, CoreError>;

  async fn record_login_attempt(&self, attempt: LoginAttempt) -> Result<(), CoreError>;
  async fn find_recent_attempts(
    &self,
    identifier: &str,
    tenant_id: &TenantId,
    since: DateTime<Utc>,
  ) -> Result<Vec<LoginAttempt>, CoreError>;

  async fn create_lockout(&self, lockout: UserLockout) -> Result<(), CoreError>;
  async fn find_active_lockout(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserLockout>, CoreError>;

  /// Returns the default sentinel if no row exists; never fails with not-found
  /// (spec 4.B).
  async fn get_tenant_login_config(
    &self,
    tenant_id: &TenantId,
  ) -> Result<TenantLoginConfig, CoreError>;

  async fn find_oauth_account(
    &self,
    provider: &str,
    provider_id: &str,
  ) -> Result<Option<OAuthAccount>, CoreError>;
  async fn link_oauth_account(&self, account: OAuthAccount) -> Result<(), CoreError>;

  /// Declare the uniqueness/TTL indexes enumerated in spec 4.B. Idempotent — safe to
  /// call on every startup.
  async fn ensure_indexes(&self) -> Result<(), CoreError>;

  /// Store-level liveness check for `/ready` (spec 6).
  async fn ping(&self) -> Result<(), CoreError>;
}
