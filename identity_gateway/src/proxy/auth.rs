//! The auth gate itself (spec 4.G steps 1-4): extract the bearer token, consult
//! the local cache, call the Token Service's `/api/v1/auth/validate` on a miss,
//! then mint the short-lived internal token handed to downstream services.
//! Grounded on `identity_core::models::jwt`'s `TokenConfigProvider`/
//! `mint_internal_token` (the same primitives `identity_server` uses to sign
//! refresh tokens), reused here rather than reimplemented.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use identity_core::models::ids::{TenantId, UserId};
use identity_core::models::jwt::{HmacTokenConfig, mint_internal_token};
use serde::Deserialize;

use crate::config::AuthConfig;

/// The claims returned by a successful validate call, cached locally.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatedClaims {
  pub user_id: String,
  pub tenant_id: String,
  pub email: Option<String>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
}

struct CacheEntry {
  claims: ValidatedClaims,
  expires_at: Instant,
}

/// Local in-process bearer-validation cache, keyed by `(token, tenant_header)`
/// (spec 4.G step 2). A performance optimization only: it never delays an
/// expired session past its TTL, it only risks serving a revoked one for up to
/// one TTL window (spec 4.G "Cache coherence", spec 8 scenario 6).
pub struct BearerCache {
  entries: DashMap<(String, Option<String>), CacheEntry>,
  ttl: Duration,
}

impl BearerCache {
  pub fn new(ttl_secs: i64) -> Self {
    Self {
      entries: DashMap::new(),
      ttl: Duration::from_secs(ttl_secs.max(0) as u64),
    }
  }

  pub fn get(&self, token: &str, tenant_header: Option<&str>) -> Option<ValidatedClaims> {
    let key = (token.to_string(), tenant_header.map(str::to_string));
    let entry = self.entries.get(&key)?;
    if entry.expires_at <= Instant::now() {
      drop(entry);
      self.entries.remove(&key);
      return None;
    }
    Some(entry.claims.clone())
  }

  pub fn insert(&self, token: &str, tenant_header: Option<&str>, claims: ValidatedClaims) {
    let key = (token.to_string(), tenant_header.map(str::to_string));
    self.entries.insert(
      key,
      CacheEntry {
        claims,
        expires_at: Instant::now() + self.ttl,
      },
    );
  }

  /// Evicted on logout; still only eventually consistent across gateway
  /// instances, bounded by `ttl` (spec 4.G "Cache coherence").
  pub fn invalidate(&self, token: &str) {
    self.entries.retain(|(t, _), _| t != token);
  }
}

#[derive(Debug, serde::Serialize)]
struct ValidateRequestBody<'a> {
  access_token: &'a str,
}

/// Calls the Token Service's `/api/v1/auth/validate` endpoint on a cache miss.
pub struct AuthClient {
  http: reqwest::Client,
  validate_url: String,
  timeout: Duration,
}

impl AuthClient {
  pub fn new(config: &AuthConfig) -> Self {
    Self {
      http: reqwest::Client::new(),
      validate_url: config.validate_url.clone(),
      timeout: Duration::from_millis(config.validate_timeout_ms),
    }
  }

  pub async fn validate(&self, access_token: &str) -> anyhow::Result<ValidatedClaims> {
    let response = self
      .http
      .post(&self.validate_url)
      .timeout(self.timeout)
      .json(&ValidateRequestBody { access_token })
      .send()
      .await?;

    if !response.status().is_success() {
      anyhow::bail!("token validation failed with status {}", response.status());
    }
    Ok(response.json::<ValidatedClaims>().await?)
  }
}

/// Mints the internal token carrying the validated claims (spec 4.G step 3, 9
/// "Token choice"). Downstream services trust this signature instead of
/// re-hitting the Session Store.
pub fn mint_internal_bearer(
  provider: &HmacTokenConfig,
  claims: &ValidatedClaims,
  ttl_secs: i64,
) -> Result<String, identity_core::error::CoreError> {
  mint_internal_token(
    provider,
    &UserId(claims.user_id.clone()),
    &TenantId(claims.tenant_id.clone()),
    claims.email.clone(),
    claims.roles.clone(),
    claims.permissions.clone(),
    ttl_secs,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_claims() -> ValidatedClaims {
    ValidatedClaims {
      user_id: "u1".to_string(),
      tenant_id: "t1".to_string(),
      email: Some("a@b.c".to_string()),
      roles: vec!["admin".to_string()],
      permissions: vec!["*".to_string()],
    }
  }

  #[test]
  fn cache_round_trips_and_respects_tenant_header() {
    let cache = BearerCache::new(60);
    cache.insert("tok", Some("acme"), sample_claims());
    assert!(cache.get("tok", Some("acme")).is_some());
    assert!(cache.get("tok", Some("other-tenant")).is_none());
    assert!(cache.get("other-token", Some("acme")).is_none());
  }

  #[test]
  fn cache_entry_expires_after_ttl() {
    let cache = BearerCache::new(0);
    cache.insert("tok", None, sample_claims());
    std::thread::sleep(Duration::from_millis(5));
    assert!(cache.get("tok", None).is_none());
  }

  #[test]
  fn invalidate_removes_all_tenant_variants_of_a_token() {
    let cache = BearerCache::new(60);
    cache.insert("tok", Some("acme"), sample_claims());
    cache.insert("tok", None, sample_claims());
    cache.invalidate("tok");
    assert!(cache.get("tok", Some("acme")).is_none());
    assert!(cache.get("tok", None).is_none());
  }

  #[test]
  fn internal_token_mint_round_trips() {
    use identity_core::models::jwt::{TokenConfigProvider, verify_internal_token};
    let provider = HmacTokenConfig::from_secret(b"test-internal-secret-32-bytes!!");
    let token = mint_internal_bearer(&provider, &sample_claims(), 60).unwrap();
    let claims = verify_internal_token(&provider, &token).unwrap();
    assert_eq!(claims.user_id, "u1");
    assert_eq!(claims.tenant_id, "t1");
  }
}
