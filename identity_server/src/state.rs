//! Application state: the wired-up Credential Store, Session Store, Permission
//! Resolver, Token Service, Login State Machine, and rate limiter, shared across
//! every handler behind a cheap `Clone` (spec 2/5) via an `Arc<Inner>` / `Deref`
//! shape.

use std::ops::Deref;
use std::sync::Arc;

use identity_core::contracts::{CredentialStore, PermissionResolver, SessionStore};
use identity_core::models::jwt::{HmacTokenConfig, RsaTokenConfig, TokenConfigProvider};
use identity_core::services::{LoginStateMachine, TokenService};

use crate::config::{AppConfig, TokenConfig};
use crate::rate_limiter::RateLimiter;
use crate::repositories::{
  DashMapPermissionCache, MongoCredentialStore, RedisPermissionCache, RedisSessionStore,
  TwoLevelPermissionResolver,
};

#[derive(Clone)]
pub struct AppState {
  inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
  pub config: AppConfig,
  pub credential_store: Arc<dyn CredentialStore>,
  pub session_store: Arc<dyn SessionStore>,
  pub permission_resolver: Arc<dyn PermissionResolver>,
  pub token_config: Arc<dyn TokenConfigProvider>,
  pub token_service: Arc<TokenService>,
  pub login_state_machine: Arc<LoginStateMachine>,
  pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
  pub fn new(inner: AppStateInner) -> Self {
    Self {
      inner: Arc::new(inner),
    }
  }

  /// Connects to Mongo and Redis, constructs every concrete store, and wires the
  /// Login State Machine and Token Service on top of them. The one place that
  /// turns `AppConfig` into a running `AppState` (spec 2 ambient stack).
  pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
    let credential_store: Arc<dyn CredentialStore> = Arc::new(
      MongoCredentialStore::connect(&config.mongo.uri, &config.mongo.database).await?,
    );
    credential_store.ensure_indexes().await?;

    let session_store: Arc<dyn SessionStore> = Arc::new(
      RedisSessionStore::connect(&config.redis.url, config.redis.scan_batch_size).await?,
    );

    let l1 = Arc::new(DashMapPermissionCache::new());
    let l2 = Arc::new(RedisPermissionCache::connect(&config.redis.url, config.redis.scan_batch_size).await?);
    let permission_resolver: Arc<dyn PermissionResolver> = Arc::new(TwoLevelPermissionResolver::new(
      l1,
      l2,
      credential_store.clone(),
    ));

    let token_config: Arc<dyn TokenConfigProvider> = match &config.token {
      TokenConfig::Hs256 { secret } => Arc::new(HmacTokenConfig::from_secret(secret.as_bytes())),
      TokenConfig::Rs256 {
        private_key_path,
        public_key_path,
      } => {
        let private_pem = std::fs::read(private_key_path)?;
        let public_pem = std::fs::read(public_key_path)?;
        Arc::new(RsaTokenConfig::from_pem(&private_pem, &public_pem)?)
      }
    };

    let token_service = Arc::new(TokenService::new(
      credential_store.clone(),
      session_store.clone(),
      permission_resolver.clone(),
      token_config.clone(),
    ));
    let login_state_machine = Arc::new(LoginStateMachine::new(credential_store.clone(), token_service.clone()));

    let rate_limit_conn =
      redis::Client::open(config.redis.url.clone())?.get_connection_manager().await?;
    let rate_limiter = Arc::new(RateLimiter::new(rate_limit_conn, config.rate_limiting.enabled));

    Ok(Self::new(AppStateInner {
      config,
      credential_store,
      session_store,
      permission_resolver,
      token_config,
      token_service,
      login_state_machine,
      rate_limiter,
    }))
  }
}

impl Deref for AppState {
  type Target = AppStateInner;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}
