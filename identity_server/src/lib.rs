//! Identity engine HTTP server: the Credential Store, Session Store, Permission
//! Resolver, Token Service, and Login State Machine wired behind the auth surface
//! of spec 6. `get_router` assembles the axum `Router<AppState>`; `main.rs` loads
//! configuration, builds `AppState` via `state::AppState::build`, and serves it.

pub mod config;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod rate_limiter;
pub mod repositories;
pub mod state;

use axum::Router;
use axum::routing::{get, post};

use crate::openapi::OpenApiRouter;
use crate::state::AppState;

/// The full HTTP surface of spec 6, plus `/health`/`/ready` and the OpenAPI/docs
/// routes (spec 2 ambient stack).
pub fn get_router(state: AppState) -> Router {
  Router::new()
    .route("/api/v1/auth/register", post(handlers::register_handler))
    .route("/api/v1/auth/login", post(handlers::login_handler))
    .route("/api/v1/auth/refresh", post(handlers::refresh_handler))
    .route("/api/v1/auth/logout", post(handlers::logout_handler))
    .route("/api/v1/auth/validate", post(handlers::validate_handler))
    .route(
      "/api/v1/auth/oauth/callback",
      post(handlers::oauth_callback_handler),
    )
    .route("/health", get(handlers::health_handler))
    .route("/ready", get(handlers::ready_handler))
    .openapi_routes()
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::Body;
  use axum::http::{Request, StatusCode};
  use std::sync::Arc;
  use tower::ServiceExt;

  use identity_core::contracts::{CredentialStore, PermissionResolution, PermissionResolver, SessionStore};
  use identity_core::error::CoreError;
  use identity_core::models::ids::{TenantId, UserId};
  use identity_core::models::jwt::{HmacTokenConfig, TokenConfigProvider};
  use identity_core::services::{LoginStateMachine, TokenService};
  use identity_core::testing::{InMemoryCredentialStore, InMemorySessionStore};

  use crate::config::{
    AppConfig, MongoConfig, ObservabilityConfig, RateLimitConfig, RedisConfig, ServerConfig, TokenConfig,
  };
  use crate::rate_limiter::RateLimiter;
  use crate::state::AppStateInner;

  struct NoopPermissionResolver;

  #[async_trait::async_trait]
  impl PermissionResolver for NoopPermissionResolver {
    async fn resolve_permissions(
      &self,
      _user_id: &UserId,
      _tenant_id: &TenantId,
    ) -> Result<PermissionResolution, CoreError> {
      Ok(PermissionResolution {
        permissions: Vec::new(),
        cache_hit: false,
      })
    }
    async fn invalidate(&self, _user_id: &UserId, _tenant_id: &TenantId) {}
    async fn invalidate_tenant(&self, _tenant_id: &TenantId) {}
  }

  fn test_config() -> AppConfig {
    AppConfig {
      server: ServerConfig {
        port: 8080,
        request_timeout_ms: 5_000,
      },
      mongo: MongoConfig {
        uri: "mongodb://unused".to_string(),
        database: "unused".to_string(),
      },
      redis: RedisConfig {
        url: "redis://unused".to_string(),
        scan_batch_size: 200,
      },
      token: TokenConfig::Hs256 {
        secret: "test-secret-at-least-32-bytes!!".to_string(),
      },
      rate_limiting: RateLimitConfig {
        enabled: false,
        login: crate::config::RateLimitThreshold {
          max_requests: 5,
          window_seconds: 60,
        },
        register: crate::config::RateLimitThreshold {
          max_requests: 3,
          window_seconds: 3_600,
        },
        refresh: crate::config::RateLimitThreshold {
          max_requests: 10,
          window_seconds: 60,
        },
        oauth_callback: crate::config::RateLimitThreshold {
          max_requests: 5,
          window_seconds: 60,
        },
      },
      observability: ObservabilityConfig {
        log_level: "info".to_string(),
      },
    }
  }

  async fn test_state() -> AppState {
    let credential_store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let permission_resolver: Arc<dyn PermissionResolver> = Arc::new(NoopPermissionResolver);
    let token_config: Arc<dyn TokenConfigProvider> =
      Arc::new(HmacTokenConfig::from_secret(b"test-secret-at-least-32-bytes!!"));
    let token_service = Arc::new(TokenService::new(
      credential_store.clone(),
      session_store.clone(),
      permission_resolver.clone(),
      token_config.clone(),
    ));
    let login_state_machine = Arc::new(LoginStateMachine::new(credential_store.clone(), token_service.clone()));

    AppState::new(AppStateInner {
      config: test_config(),
      credential_store,
      session_store,
      permission_resolver,
      token_config,
      token_service,
      login_state_machine,
      rate_limiter: Arc::new(RateLimiter::disabled()),
    })
  }

  #[tokio::test]
  async fn health_endpoint_never_touches_stores() {
    let app = get_router(test_state().await);
    let response = app
      .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn openapi_document_is_served() {
    let app = get_router(test_state().await);
    let response = app
      .oneshot(
        Request::builder()
          .uri("/api-docs/openapi.json")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn register_then_login_round_trips_through_the_router() {
    let app = get_router(test_state().await);
    let body = serde_json::json!({
      "email": "new.user@example.com",
      "password": "Sup3r$ecretPW",
      "tenant_id": "acme",
      "roles": []
    });
    let response = app
      .oneshot(
        Request::builder()
          .method("POST")
          .uri("/api/v1/auth/register")
          .header("content-type", "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
      )
      .await
      .unwrap();
    // The sentinel tenant config allows registration by default.
    assert_eq!(response.status(), StatusCode::OK);
  }

  async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> axum::http::Response<Body> {
    app
      .oneshot(
        Request::builder()
          .method("POST")
          .uri(uri)
          .header("content-type", "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
      )
      .await
      .unwrap()
  }

  /// Spec 8 scenario 2: a user with membership only in one tenant is refused
  /// access to another tenant, end to end through the HTTP surface.
  #[tokio::test]
  async fn login_across_the_wrong_tenant_is_forbidden() {
    let app = get_router(test_state().await);

    let register_body = serde_json::json!({
      "email": "cross@example.com",
      "password": "Sup3r$ecretPW",
      "tenant_id": "t1",
      "roles": []
    });
    let resp = post_json(app.clone(), "/api/v1/auth/register", register_body).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let login_body = serde_json::json!({
      "identifier": "cross@example.com",
      "password": "Sup3r$ecretPW",
      "tenant_id": "t2"
    });
    let resp = post_json(app, "/api/v1/auth/login", login_body).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  /// Spec 8 scenario 4: refresh rotation through the HTTP surface — a new pair is
  /// returned and the old refresh token is rejected on replay.
  #[tokio::test]
  async fn refresh_endpoint_rotates_and_rejects_replay() {
    let app = get_router(test_state().await);

    let register_body = serde_json::json!({
      "email": "rotate@example.com",
      "password": "Sup3r$ecretPW",
      "tenant_id": "acme",
      "roles": []
    });
    let resp = post_json(app.clone(), "/api/v1/auth/register", register_body).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let refresh_token = json["refresh_token"].as_str().unwrap().to_string();

    let resp = post_json(
      app.clone(),
      "/api/v1/auth/refresh",
      serde_json::json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = post_json(
      app,
      "/api/v1/auth/refresh",
      serde_json::json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }
}
