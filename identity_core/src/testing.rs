//! In-memory fakes for the store contracts (spec 4.B: "an in-memory fake is
//! provided for tests that exercise the Login State Machine without a real
//! database"). Not `#[cfg(test)]`-gated: `identity_server`'s own test suite and any
//! downstream consumer depend on this module directly, as ordinary (non-test-only)
//! items reused across crates.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::contracts::{CredentialStore, PermissionResolution, PermissionResolver, SessionStore};
use crate::error::CoreError;
use crate::models::ids::{RoleId, TenantId, UserId};
use crate::models::lockout::UserLockout;
use crate::models::login_attempt::LoginAttempt;
use crate::models::oauth_account::OAuthAccount;
use crate::models::refresh_credential::RefreshCredential;
use crate::models::role::Role;
use crate::models::tenant::{TenantLoginConfig, UserTenantMembership};
use crate::models::user::{NewUser, User};

fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

#[derive(Default)]
struct Storage {
  users: Vec<User>,
  memberships: Vec<UserTenantMembership>,
  roles: Vec<Role>,
  tenant_configs: HashMap<TenantId, TenantLoginConfig>,
  refresh_credentials: Vec<RefreshCredential>,
  login_attempts: Vec<LoginAttempt>,
  lockouts: Vec<UserLockout>,
  oauth_accounts: Vec<OAuthAccount>,
}

/// An in-process `CredentialStore` backed by `Vec`/`HashMap` guarded by a single
/// `RwLock`, matching the uniqueness and idempotence invariants of spec 4.B without
/// a real database round-trip.
#[derive(Default)]
pub struct InMemoryCredentialStore {
  storage: RwLock<Storage>,
}

impl InMemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Test convenience: seed a tenant's login config directly, bypassing the
  /// "sentinel when absent" default.
  pub fn seed_tenant_config(&self, config: TenantLoginConfig) {
    let mut storage = self.storage.write().unwrap();
    storage.tenant_configs.insert(config.tenant_id.clone(), config);
  }

  /// Test convenience: seed a role directly.
  pub fn seed_role(&self, role: Role) {
    self.storage.write().unwrap().roles.push(role);
  }
}

fn identifier_collides(storage: &Storage, user: &NewUser, exclude: Option<&UserId>) -> bool {
  storage.users.iter().any(|u| {
    if exclude.is_some_and(|id| id == &u.id) {
      return false;
    }
    (user.email.is_some() && user.email == u.email)
      || (user.username.is_some() && user.username == u.username)
      || (user.phone.is_some() && user.phone == u.phone)
      || (user.doc_number.is_some() && user.doc_number == u.doc_number)
  })
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
  async fn create_user(&self, user: &NewUser) -> Result<User, CoreError> {
    let mut storage = self.storage.write().unwrap();
    if identifier_collides(&storage, user, None) {
      return Err(CoreError::Conflict("duplicate identifier".to_string()));
    }
    let now = Utc::now();
    let created = User {
      id: UserId(new_id()),
      email: user.email.clone(),
      username: user.username.clone(),
      phone: user.phone.clone(),
      doc_number: user.doc_number.clone(),
      password_hash: user.password.clone(),
      is_active: true,
      is_verified: false,
      last_login_at: None,
      created_at: now,
      updated_at: now,
    };
    storage.users.push(created.clone());
    Ok(created)
  }

  async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .users
        .iter()
        .find(|u| {
          u.email.as_deref() == Some(identifier)
            || u.username.as_deref() == Some(identifier)
            || u.phone.as_deref() == Some(identifier)
            || u.doc_number.as_deref() == Some(identifier)
        })
        .cloned(),
    )
  }

  async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(storage.users.iter().find(|u| &u.id == id).cloned())
  }

  async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if let Some(user) = storage.users.iter_mut().find(|u| &u.id == id) {
      user.last_login_at = Some(at);
      user.updated_at = at;
    }
    Ok(())
  }

  async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if let Some(user) = storage.users.iter_mut().find(|u| &u.id == id) {
      user.is_active = is_active;
      user.updated_at = Utc::now();
    }
    Ok(())
  }

  async fn add_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<UserTenantMembership, CoreError> {
    let mut storage = self.storage.write().unwrap();
    let now = Utc::now();
    if let Some(existing) = storage
      .memberships
      .iter_mut()
      .find(|m| &m.user_id == user_id && &m.tenant_id == tenant_id)
    {
      existing.roles = roles;
      existing.is_active = true;
      existing.updated_at = now;
      return Ok(existing.clone());
    }
    let created = UserTenantMembership {
      user_id: user_id.clone(),
      tenant_id: tenant_id.clone(),
      roles,
      is_active: true,
      joined_at: now,
      updated_at: now,
    };
    storage.memberships.push(created.clone());
    Ok(created)
  }

  async fn find_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserTenantMembership>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .memberships
        .iter()
        .find(|m| &m.user_id == user_id && &m.tenant_id == tenant_id)
        .cloned(),
    )
  }

  async fn deactivate_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if let Some(m) = storage
      .memberships
      .iter_mut()
      .find(|m| &m.user_id == user_id && &m.tenant_id == tenant_id)
    {
      m.is_active = false;
      m.updated_at = Utc::now();
    }
    Ok(())
  }

  async fn update_membership_roles(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if let Some(m) = storage
      .memberships
      .iter_mut()
      .find(|m| &m.user_id == user_id && &m.tenant_id == tenant_id)
    {
      m.roles = roles;
      m.updated_at = Utc::now();
    }
    Ok(())
  }

  async fn find_roles_by_names(
    &self,
    names: &[String],
    tenant_id: &TenantId,
  ) -> Result<Vec<Role>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .roles
        .iter()
        .filter(|r| names.contains(&r.name) && r.applies_to(tenant_id))
        .cloned()
        .collect(),
    )
  }

  async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(storage.roles.iter().find(|r| &r.id == id).cloned())
  }

  async fn create_refresh_credential(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    token: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<RefreshCredential, CoreError> {
    let mut storage = self.storage.write().unwrap();
    let created = RefreshCredential {
      user_id: user_id.clone(),
      tenant_id: tenant_id.clone(),
      token: token.to_string(),
      expires_at,
      created_at: Utc::now(),
      revoked_at: None,
    };
    storage.refresh_credentials.push(created.clone());
    Ok(created)
  }

  async fn find_valid_refresh_credential(
    &self,
    token: &str,
  ) -> Result<Option<RefreshCredential>, CoreError> {
    let storage = self.storage.read().unwrap();
    let now = Utc::now();
    Ok(
      storage
        .refresh_credentials
        .iter()
        .find(|c| c.token == token && c.is_valid(now))
        .cloned(),
    )
  }

  async fn revoke_refresh_credential(&self, token: &str) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if let Some(c) = storage
      .refresh_credentials
      .iter_mut()
      .find(|c| c.token == token)
    {
      c.revoked_at = Some(Utc::now());
    }
    Ok(())
  }

  async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    let now = Utc::now();
    for c in storage
      .refresh_credentials
      .iter_mut()
      .filter(|c| &c.user_id == user_id)
    {
      c.revoked_at = Some(now);
    }
    Ok(())
  }

  async fn revoke_for_tenant(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    let now = Utc::now();
    for c in storage
      .refresh_credentials
      .iter_mut()
      .filter(|c| &c.user_id == user_id && &c.tenant_id == tenant_id)
    {
      c.revoked_at = Some(now);
    }
    Ok(())
  }

  async fn count_active_for_user(&self, user_id: &UserId) -> Result<u64, CoreError> {
    let storage = self.storage.read().unwrap();
    let now = Utc::now();
    Ok(
      storage
        .refresh_credentials
        .iter()
        .filter(|c| &c.user_id == user_id && c.is_valid(now))
        .count() as u64,
    )
  }

  async fn record_login_attempt(&self, attempt: LoginAttempt) -> Result<(), CoreError> {
    self.storage.write().unwrap().login_attempts.push(attempt);
    Ok(())
  }

  async fn find_recent_attempts(
    &self,
    identifier: &str,
    tenant_id: &TenantId,
    since: DateTime<Utc>,
  ) -> Result<Vec<LoginAttempt>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .login_attempts
        .iter()
        .filter(|a| a.identifier == identifier && &a.tenant_id == tenant_id && a.timestamp >= since)
        .cloned()
        .collect(),
    )
  }

  async fn create_lockout(&self, lockout: UserLockout) -> Result<(), CoreError> {
    self.storage.write().unwrap().lockouts.push(lockout);
    Ok(())
  }

  async fn find_active_lockout(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserLockout>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .lockouts
        .iter()
        .rev()
        .find(|l| &l.user_id == user_id && &l.tenant_id == tenant_id && l.is_active)
        .cloned(),
    )
  }

  async fn get_tenant_login_config(
    &self,
    tenant_id: &TenantId,
  ) -> Result<TenantLoginConfig, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .tenant_configs
        .get(tenant_id)
        .cloned()
        .unwrap_or_else(|| TenantLoginConfig::default_sentinel(tenant_id.clone())),
    )
  }

  async fn find_oauth_account(
    &self,
    provider: &str,
    provider_id: &str,
  ) -> Result<Option<OAuthAccount>, CoreError> {
    let storage = self.storage.read().unwrap();
    Ok(
      storage
        .oauth_accounts
        .iter()
        .find(|a| a.provider == provider && a.provider_id == provider_id)
        .cloned(),
    )
  }

  async fn link_oauth_account(&self, account: OAuthAccount) -> Result<(), CoreError> {
    let mut storage = self.storage.write().unwrap();
    if storage
      .oauth_accounts
      .iter()
      .any(|a| a.provider == account.provider && a.provider_id == account.provider_id)
    {
      return Err(CoreError::Conflict(
        "oauth account already linked".to_string(),
      ));
    }
    storage.oauth_accounts.push(account);
    Ok(())
  }

  async fn ensure_indexes(&self) -> Result<(), CoreError> {
    Ok(())
  }

  async fn ping(&self) -> Result<(), CoreError> {
    Ok(())
  }
}

/// An in-process `SessionStore` backed by a `HashMap`, with TTL enforced by
/// checking an explicit expiry on every read rather than a background sweep —
/// sufficient for tests, which never rely on purge timing.
#[derive(Default)]
pub struct InMemorySessionStore {
  entries: RwLock<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl InMemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
  async fn set(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<(), CoreError> {
    let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs.max(0));
    self
      .entries
      .write()
      .unwrap()
      .insert(key.to_string(), (value.to_vec(), expires_at));
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
    let mut entries = self.entries.write().unwrap();
    match entries.get(key) {
      Some((_, expires_at)) if *expires_at <= Utc::now() => {
        entries.remove(key);
        Ok(None)
      }
      Some((value, _)) => Ok(Some(value.clone())),
      None => Ok(None),
    }
  }

  async fn delete(&self, key: &str) -> Result<(), CoreError> {
    self.entries.write().unwrap().remove(key);
    Ok(())
  }

  async fn delete_pattern(&self, pattern: &str) -> Result<u64, CoreError> {
    // Tests only ever use a trailing-`*` prefix pattern (matching the Redis
    // implementation's `SCAN ... MATCH prefix*`), so a prefix check suffices here.
    let prefix = pattern.trim_end_matches('*');
    let mut entries = self.entries.write().unwrap();
    let to_remove: Vec<String> = entries
      .keys()
      .filter(|k| k.starts_with(prefix))
      .cloned()
      .collect();
    for key in &to_remove {
      entries.remove(key);
    }
    Ok(to_remove.len() as u64)
  }

  async fn ping(&self) -> Result<(), CoreError> {
    Ok(())
  }
}

/// An in-process `PermissionResolver` backed by a single cache map rather than the
/// real L1/L2 split (`identity_server::repositories::permission_cache::TwoLevelPermissionResolver`),
/// sufficient for tests that exercise resolution and invalidation without standing
/// up Redis (spec 4.D).
pub struct InMemoryPermissionResolver {
  credential_store: std::sync::Arc<dyn CredentialStore>,
  cache: RwLock<HashMap<(UserId, TenantId), Vec<String>>>,
}

impl InMemoryPermissionResolver {
  pub fn new(credential_store: std::sync::Arc<dyn CredentialStore>) -> Self {
    Self {
      credential_store,
      cache: RwLock::new(HashMap::new()),
    }
  }
}

#[async_trait]
impl PermissionResolver for InMemoryPermissionResolver {
  async fn resolve_permissions(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<PermissionResolution, CoreError> {
    let key = (user_id.clone(), tenant_id.clone());
    if let Some(permissions) = self.cache.read().unwrap().get(&key).cloned() {
      return Ok(PermissionResolution {
        permissions,
        cache_hit: true,
      });
    }

    let membership = self
      .credential_store
      .find_membership(user_id, tenant_id)
      .await?
      .filter(|m| m.is_active);
    let permissions = match membership {
      Some(m) => {
        self
          .credential_store
          .aggregate_permissions(&m.roles, tenant_id)
          .await?
      }
      None => Vec::new(),
    };

    self.cache.write().unwrap().insert(key, permissions.clone());
    Ok(PermissionResolution {
      permissions,
      cache_hit: false,
    })
  }

  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId) {
    self
      .cache
      .write()
      .unwrap()
      .remove(&(user_id.clone(), tenant_id.clone()));
  }

  async fn invalidate_tenant(&self, tenant_id: &TenantId) {
    self.cache.write().unwrap().retain(|(_, t), _| t != tenant_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn create_user_rejects_duplicate_identifier() {
    let store = InMemoryCredentialStore::new();
    let user = NewUser {
      email: Some("a@b.c".into()),
      username: None,
      phone: None,
      doc_number: None,
      password: "hash".into(),
    };
    store.create_user(&user).await.unwrap();
    let err = store.create_user(&user).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
  }

  #[tokio::test]
  async fn add_membership_is_idempotent_and_replaces_roles() {
    let store = InMemoryCredentialStore::new();
    let user_id = UserId("u1".into());
    let tenant_id = TenantId("t1".into());
    store
      .add_membership(&user_id, &tenant_id, vec!["viewer".into()])
      .await
      .unwrap();
    let second = store
      .add_membership(&user_id, &tenant_id, vec!["admin".into()])
      .await
      .unwrap();
    assert_eq!(second.roles, vec!["admin".to_string()]);

    let memberships = store.storage.read().unwrap().memberships.len();
    assert_eq!(memberships, 1);
  }

  #[tokio::test]
  async fn reactivates_deactivated_membership_on_add() {
    let store = InMemoryCredentialStore::new();
    let user_id = UserId("u1".into());
    let tenant_id = TenantId("t1".into());
    store
      .add_membership(&user_id, &tenant_id, vec!["viewer".into()])
      .await
      .unwrap();
    store.deactivate_membership(&user_id, &tenant_id).await.unwrap();
    let m = store.find_membership(&user_id, &tenant_id).await.unwrap().unwrap();
    assert!(!m.is_active);

    store
      .add_membership(&user_id, &tenant_id, vec!["viewer".into()])
      .await
      .unwrap();
    let m = store.find_membership(&user_id, &tenant_id).await.unwrap().unwrap();
    assert!(m.is_active);
  }

  #[tokio::test]
  async fn session_store_expires_by_ttl() {
    let store = InMemorySessionStore::new();
    store.set("k", b"v", -1).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
  }

  #[tokio::test]
  async fn session_store_delete_pattern_is_prefix_scoped() {
    let store = InMemorySessionStore::new();
    store.set("session:a", b"1", 60).await.unwrap();
    store.set("session:b", b"2", 60).await.unwrap();
    store.set("other:c", b"3", 60).await.unwrap();

    let deleted = store.delete_pattern("session:*").await.unwrap();
    assert_eq!(deleted, 2);
    assert!(store.get("other:c").await.unwrap().is_some());
  }
}
