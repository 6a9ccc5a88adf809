//! The two-level permission cache and resolver (spec 4.D): L1 process-local
//! (`dashmap`), L2 shared (Redis, same client shape as `RedisSessionStore`).
//! `TwoLevelPermissionResolver` composes them with the Credential Store as the
//! load-on-miss source.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use identity_core::contracts::{CredentialStore, PermissionCache, PermissionResolution, PermissionResolver};
use identity_core::error::CoreError;
use identity_core::models::ids::{TenantId, UserId};

struct L1Entry {
  permissions: Vec<String>,
  expires_at: Instant,
}

/// L1: process-local, short TTL (spec 4.D: "L1 ≤ L2 ≤ 5 minutes").
pub struct DashMapPermissionCache {
  entries: DashMap<(UserId, TenantId), L1Entry>,
}

impl DashMapPermissionCache {
  pub fn new() -> Self {
    Self {
      entries: DashMap::new(),
    }
  }
}

impl Default for DashMapPermissionCache {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl PermissionCache for DashMapPermissionCache {
  async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> Option<Vec<String>> {
    let key = (user_id.clone(), tenant_id.clone());
    let entry = self.entries.get(&key)?;
    if entry.expires_at <= Instant::now() {
      drop(entry);
      self.entries.remove(&key);
      return None;
    }
    Some(entry.permissions.clone())
  }

  async fn insert(&self, user_id: &UserId, tenant_id: &TenantId, permissions: Vec<String>, ttl_secs: i64) {
    self.entries.insert(
      (user_id.clone(), tenant_id.clone()),
      L1Entry {
        permissions,
        expires_at: Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64),
      },
    );
  }

  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId) {
    self.entries.remove(&(user_id.clone(), tenant_id.clone()));
  }

  async fn invalidate_tenant(&self, tenant_id: &TenantId) {
    self.entries.retain(|(_, t), _| t != tenant_id);
  }
}

/// L2: shared across replicas.
pub struct RedisPermissionCache {
  conn: ConnectionManager,
  scan_batch_size: u32,
}

impl RedisPermissionCache {
  pub async fn connect(url: &str, scan_batch_size: u32) -> Result<Self, CoreError> {
    let client = redis::Client::open(url).map_err(|e| CoreError::Internal(e.to_string()))?;
    let conn = client
      .get_connection_manager()
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(Self {
      conn,
      scan_batch_size,
    })
  }

  fn key(user_id: &UserId, tenant_id: &TenantId) -> String {
    format!("perm:{tenant_id}:{user_id}")
  }
}

#[async_trait]
impl PermissionCache for RedisPermissionCache {
  async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> Option<Vec<String>> {
    let mut conn = self.conn.clone();
    let data: Option<Vec<u8>> = conn.get(Self::key(user_id, tenant_id)).await.ok()?;
    data.and_then(|bytes| serde_json::from_slice(&bytes).ok())
  }

  async fn insert(&self, user_id: &UserId, tenant_id: &TenantId, permissions: Vec<String>, ttl_secs: i64) {
    let mut conn = self.conn.clone();
    if let Ok(bytes) = serde_json::to_vec(&permissions) {
      let _: Result<(), _> = conn
        .set_ex::<_, _, ()>(Self::key(user_id, tenant_id), bytes, ttl_secs.max(1) as u64)
        .await;
    }
  }

  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId) {
    let mut conn = self.conn.clone();
    let _: Result<(), _> = conn.del::<_, ()>(Self::key(user_id, tenant_id)).await;
  }

  async fn invalidate_tenant(&self, tenant_id: &TenantId) {
    let mut conn = self.conn.clone();
    let pattern = format!("perm:{tenant_id}:*");
    let mut cursor: u64 = 0;
    let mut keys: Vec<String> = Vec::new();
    loop {
      let result: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(&pattern)
        .arg("COUNT")
        .arg(self.scan_batch_size)
        .query_async(&mut conn)
        .await;
      let Ok((next_cursor, batch)) = result else {
        return;
      };
      keys.extend(batch);
      cursor = next_cursor;
      if cursor == 0 {
        break;
      }
    }
    if !keys.is_empty() {
      let _: Result<(), _> = conn.del::<_, ()>(&keys).await;
    }
  }
}

const L1_TTL_SECS: i64 = 60;
const L2_TTL_SECS: i64 = 300;

pub struct TwoLevelPermissionResolver {
  l1: Arc<dyn PermissionCache>,
  l2: Arc<dyn PermissionCache>,
  credential_store: Arc<dyn CredentialStore>,
}

impl TwoLevelPermissionResolver {
  pub fn new(
    l1: Arc<dyn PermissionCache>,
    l2: Arc<dyn PermissionCache>,
    credential_store: Arc<dyn CredentialStore>,
  ) -> Self {
    Self {
      l1,
      l2,
      credential_store,
    }
  }
}

#[async_trait]
impl PermissionResolver for TwoLevelPermissionResolver {
  async fn resolve_permissions(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<PermissionResolution, CoreError> {
    if let Some(permissions) = self.l1.get(user_id, tenant_id).await {
      return Ok(PermissionResolution {
        permissions,
        cache_hit: true,
      });
    }
    if let Some(permissions) = self.l2.get(user_id, tenant_id).await {
      self
        .l1
        .insert(user_id, tenant_id, permissions.clone(), L1_TTL_SECS)
        .await;
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

    self
      .l1
      .insert(user_id, tenant_id, permissions.clone(), L1_TTL_SECS)
      .await;
    self
      .l2
      .insert(user_id, tenant_id, permissions.clone(), L2_TTL_SECS)
      .await;

    Ok(PermissionResolution {
      permissions,
      cache_hit: false,
    })
  }

  async fn invalidate(&self, user_id: &UserId, tenant_id: &TenantId) {
    self.l1.invalidate(user_id, tenant_id).await;
    self.l2.invalidate(user_id, tenant_id).await;
  }

  async fn invalidate_tenant(&self, tenant_id: &TenantId) {
    self.l1.invalidate_tenant(tenant_id).await;
    self.l2.invalidate_tenant(tenant_id).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn l1_cache_round_trips_and_expires() {
    let cache = DashMapPermissionCache::new();
    let user_id = UserId("u1".into());
    let tenant_id = TenantId("t1".into());

    assert!(cache.get(&user_id, &tenant_id).await.is_none());
    cache
      .insert(&user_id, &tenant_id, vec!["user.read".into()], 60)
      .await;
    assert_eq!(
      cache.get(&user_id, &tenant_id).await,
      Some(vec!["user.read".to_string()])
    );

    cache.invalidate(&user_id, &tenant_id).await;
    assert!(cache.get(&user_id, &tenant_id).await.is_none());
  }

  #[tokio::test]
  async fn l1_invalidate_tenant_clears_only_that_tenant() {
    let cache = DashMapPermissionCache::new();
    let user_id = UserId("u1".into());
    let t1 = TenantId("t1".into());
    let t2 = TenantId("t2".into());
    cache.insert(&user_id, &t1, vec!["a".into()], 60).await;
    cache.insert(&user_id, &t2, vec!["b".into()], 60).await;

    cache.invalidate_tenant(&t1).await;

    assert!(cache.get(&user_id, &t1).await.is_none());
    assert!(cache.get(&user_id, &t2).await.is_some());
  }
}
