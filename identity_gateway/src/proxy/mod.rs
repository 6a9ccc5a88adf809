//! The gateway front-half (spec 4.G): classify each request path, apply the
//! auth gate to `/api/*` (except login/register), and reverse-proxy to the
//! resolved service. Implemented as a Pingora `ProxyHttp` impl.

pub mod audit;
pub mod auth;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use identity_core::models::jwt::HmacTokenConfig;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::upstream::UpstreamManager;
use audit::{AuditConfig, GatewayAuditLogger};
use auth::{AuthClient, BearerCache, ValidatedClaims, mint_internal_bearer};

/// The fixed routing rule of spec 4.G, applied to every request path. There
/// is no declaration-order route table to match against: the rule itself
/// never changes, so there is nothing to configure here beyond the upstream
/// registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedRoute {
  Api { service: String, forward_path: String },
  Page { service: String, forward_path: String },
  Upload { forward_path: String },
  Slug { forward_path: String },
}

impl ClassifiedRoute {
  pub fn upstream_name(&self) -> String {
    match self {
      ClassifiedRoute::Api { service, .. } => service.clone(),
      ClassifiedRoute::Page { service, .. } => format!("{service}-frontend"),
      ClassifiedRoute::Upload { .. } => "file-service".to_string(),
      ClassifiedRoute::Slug { .. } => "slug-service".to_string(),
    }
  }

  pub fn forward_path(&self) -> &str {
    match self {
      ClassifiedRoute::Api { forward_path, .. }
      | ClassifiedRoute::Page { forward_path, .. }
      | ClassifiedRoute::Upload { forward_path }
      | ClassifiedRoute::Slug { forward_path } => forward_path,
    }
  }

  /// Auth applies to `/api/*` except the two endpoints that have to work
  /// without a prior session (spec 4.G).
  pub fn requires_auth(&self) -> bool {
    match self {
      ClassifiedRoute::Api { forward_path, .. } => {
        forward_path != "/auth/login" && forward_path != "/auth/register"
      }
      _ => false,
    }
  }

  /// Whether a missing upstream for this route should 404 rather than 503.
  /// Only the slug fallback is documented as "if registered, else 404"; an
  /// `/api/{service}` or `/page/{service}` naming an unknown service is the
  /// same situation in practice.
  pub fn not_found_when_unregistered(&self) -> bool {
    true
  }
}

/// Splits `/prefix/{segment}/{rest...}` into `(segment, "/rest...")`, or
/// `(segment, "/")` when there is no remainder.
fn split_first_segment(rest: &str) -> Option<(String, String)> {
  let mut parts = rest.splitn(2, '/');
  let segment = parts.next().filter(|s| !s.is_empty())?;
  let forward_path = match parts.next() {
    Some(p) if !p.is_empty() => format!("/{p}"),
    _ => "/".to_string(),
  };
  Some((segment.to_string(), forward_path))
}

pub fn classify_path(path: &str) -> ClassifiedRoute {
  if let Some(rest) = path.strip_prefix("/api/") {
    if let Some((service, forward_path)) = split_first_segment(rest) {
      return ClassifiedRoute::Api { service, forward_path };
    }
  }
  if let Some(rest) = path.strip_prefix("/page/") {
    if let Some((service, forward_path)) = split_first_segment(rest) {
      return ClassifiedRoute::Page { service, forward_path };
    }
  }
  if let Some(rest) = path.strip_prefix("/upload") {
    let forward_path = if rest.is_empty() { "/".to_string() } else { rest.to_string() };
    return ClassifiedRoute::Upload { forward_path };
  }
  ClassifiedRoute::Slug {
    forward_path: path.to_string(),
  }
}

#[derive(Debug, Clone)]
struct RateLimit {
  requests: Vec<Instant>,
  violations: u32,
}

impl RateLimit {
  fn new() -> Self {
    Self {
      requests: Vec::new(),
      violations: 0,
    }
  }

  fn check_limit(&mut self, max_requests: usize, window_secs: u64) -> bool {
    let now = Instant::now();
    let window = std::time::Duration::from_secs(window_secs);
    self.requests.retain(|&time| now.duration_since(time) < window);
    if self.requests.len() >= max_requests {
      self.violations += 1;
      false
    } else {
      self.requests.push(now);
      true
    }
  }

  fn get_remaining(&self, max_requests: usize) -> usize {
    max_requests.saturating_sub(self.requests.len())
  }
}

/// Request-scoped state threaded through the `ProxyHttp` callbacks.
#[derive(Debug, Default)]
pub struct RequestContext {
  pub request_id: String,
  pub route: Option<ClassifiedRoute>,
  pub rate_limited: bool,
  pub client_ip: Option<String>,
  pub cors_origin: Option<String>,
  pub claims: Option<ValidatedClaims>,
  pub cache_hit: bool,
  pub start_time: Option<Instant>,
}

impl RequestContext {
  fn new() -> Self {
    Self {
      request_id: uuid::Uuid::new_v4().to_string(),
      start_time: Some(Instant::now()),
      ..Default::default()
    }
  }
}

/// The gateway's `ProxyHttp` implementation (spec 4.G).
pub struct GatewayProxy {
  config: Arc<GatewayConfig>,
  upstream_manager: Arc<UpstreamManager>,
  rate_limiter: Arc<Mutex<HashMap<String, RateLimit>>>,
  bearer_cache: Arc<BearerCache>,
  auth_client: Arc<AuthClient>,
  internal_token_provider: Arc<HmacTokenConfig>,
  audit_logger: Arc<GatewayAuditLogger>,
}

impl GatewayProxy {
  pub fn new(config: Arc<GatewayConfig>, upstream_manager: Arc<UpstreamManager>) -> Self {
    let bearer_cache = Arc::new(BearerCache::new(config.auth.bearer_cache_ttl_secs));
    let auth_client = Arc::new(AuthClient::new(&config.auth));
    let internal_token_provider = Arc::new(HmacTokenConfig::from_secret(
      config.auth.internal_token_secret.as_bytes(),
    ));
    let audit_logger = Arc::new(GatewayAuditLogger::new(AuditConfig::default()));

    Self {
      config,
      upstream_manager,
      rate_limiter: Arc::new(Mutex::new(HashMap::new())),
      bearer_cache,
      auth_client,
      internal_token_provider,
      audit_logger,
    }
  }

  fn extract_client_ip(&self, session: &Session) -> Option<String> {
    let headers = &session.req_header().headers;
    if let Some(xff) = headers.get("x-forwarded-for") {
      if let Ok(xff_str) = xff.to_str() {
        return xff_str.split(',').next().map(|s| s.trim().to_string());
      }
    }
    headers.get("x-real-ip").and_then(|v| v.to_str().ok()).map(str::to_string)
  }

  fn is_preflight_request(&self, method: &str, headers: &pingora_http::HMap) -> bool {
    method.eq_ignore_ascii_case("OPTIONS") && headers.contains_key("access-control-request-method")
  }

  fn validate_cors_origin(&self, origin: &str) -> bool {
    self.config.is_cors_origin_allowed(origin)
  }

  fn preflight_headers(&self, origin: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if self.validate_cors_origin(origin) {
      headers.insert("access-control-allow-origin".to_string(), origin.to_string());
      headers.insert("access-control-allow-credentials".to_string(), "true".to_string());
      headers.insert(
        "access-control-allow-methods".to_string(),
        "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
      );
      headers.insert(
        "access-control-allow-headers".to_string(),
        "content-type, authorization, x-tenant-id, x-request-id".to_string(),
      );
      headers.insert("access-control-max-age".to_string(), "86400".to_string());
    }
    headers
  }

  fn rate_limit_key(&self, ctx: &RequestContext) -> String {
    match &ctx.client_ip {
      Some(ip) => format!("ip:{ip}"),
      None => "anon:default".to_string(),
    }
  }

  fn check_rate_limit(&self, key: &str) -> (bool, usize) {
    let mut limiter = self.rate_limiter.lock().unwrap();
    let entry = limiter.entry(key.to_string()).or_insert_with(RateLimit::new);
    const MAX_REQUESTS: usize = 100;
    const WINDOW_SECS: u64 = 60;
    let allowed = entry.check_limit(MAX_REQUESTS, WINDOW_SECS);
    (allowed, entry.get_remaining(MAX_REQUESTS))
  }

  fn extract_bearer(&self, session: &Session) -> Option<String> {
    let value = session.req_header().headers.get("authorization")?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
  }

  fn tenant_header(&self, session: &Session) -> Option<String> {
    session
      .req_header()
      .headers
      .get("x-tenant-id")
      .and_then(|v| v.to_str().ok())
      .map(str::to_string)
  }

  /// The auth gate itself (spec 4.G steps 1-3). Returns the validated claims
  /// or an error the caller turns into a 401.
  async fn authenticate(&self, session: &Session, ctx: &mut RequestContext) -> Result<ValidatedClaims> {
    let token = self
      .extract_bearer(session)
      .ok_or_else(|| anyhow::anyhow!("missing bearer token"))?;
    let tenant_header = self.tenant_header(session);

    if let Some(claims) = self.bearer_cache.get(&token, tenant_header.as_deref()) {
      ctx.cache_hit = true;
      return Ok(claims);
    }

    let claims = self.auth_client.validate(&token).await?;
    self.bearer_cache.insert(&token, tenant_header.as_deref(), claims.clone());
    Ok(claims)
  }
}

impl Clone for GatewayProxy {
  fn clone(&self) -> Self {
    Self {
      config: Arc::clone(&self.config),
      upstream_manager: Arc::clone(&self.upstream_manager),
      rate_limiter: Arc::clone(&self.rate_limiter),
      bearer_cache: Arc::clone(&self.bearer_cache),
      auth_client: Arc::clone(&self.auth_client),
      internal_token_provider: Arc::clone(&self.internal_token_provider),
      audit_logger: Arc::clone(&self.audit_logger),
    }
  }
}

#[async_trait]
impl ProxyHttp for GatewayProxy {
  type CTX = RequestContext;

  fn new_ctx(&self) -> Self::CTX {
    RequestContext::new()
  }

  async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool, Box<pingora_core::Error>> {
    let path = session.req_header().uri.path().to_string();
    let method = session.req_header().method.as_str().to_string();
    ctx.client_ip = self.extract_client_ip(session);

    if self.is_preflight_request(&method, &session.req_header().headers) {
      let origin = session
        .req_header()
        .headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
      return match origin {
        Some(origin) if self.validate_cors_origin(&origin) => {
          ctx.cors_origin = Some(origin);
          Ok(true)
        }
        Some(origin) => {
          warn!(%origin, "CORS preflight rejected");
          Err(pingora_core::Error::new_str("CORS preflight not allowed"))
        }
        None => Err(pingora_core::Error::new_str("CORS preflight missing origin")),
      };
    }

    let rate_key = self.rate_limit_key(ctx);
    let (allowed, _remaining) = self.check_rate_limit(&rate_key);
    if !allowed {
      ctx.rate_limited = true;
      self
        .audit_logger
        .log_rate_limit_exceeded(ctx.request_id.clone(), rate_key, 100)
        .await;
      return Err(pingora_core::Error::new_str("rate limited"));
    }

    if let Some(origin) = session.req_header().headers.get("origin").and_then(|v| v.to_str().ok()) {
      if self.validate_cors_origin(origin) {
        ctx.cors_origin = Some(origin.to_string());
      } else {
        self
          .audit_logger
          .log_cors_violation(ctx.request_id.clone(), origin.to_string())
          .await;
        return Err(pingora_core::Error::new_str("CORS origin not allowed"));
      }
    }

    let route = classify_path(&path);
    let needs_auth = route.requires_auth();
    ctx.route = Some(route);

    if needs_auth {
      match self.authenticate(session, ctx).await {
        Ok(claims) => {
          self
            .audit_logger
            .log_auth_success(ctx.request_id.clone(), claims.user_id.clone(), claims.tenant_id.clone())
            .await;
          ctx.claims = Some(claims);
        }
        Err(e) => {
          self
            .audit_logger
            .log_auth_failure(ctx.request_id.clone(), ctx.client_ip.clone(), e.to_string())
            .await;
          return Err(pingora_core::Error::new_str("unauthenticated"));
        }
      }
    }

    Ok(false)
  }

  async fn upstream_peer(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<Box<HttpPeer>, Box<pingora_core::Error>> {
    let path = session.req_header().uri.path();
    let route = ctx.route.clone().unwrap_or_else(|| classify_path(path));
    let upstream_name = route.upstream_name();

    if !self.upstream_manager.has_upstream(&upstream_name) {
      if route.not_found_when_unregistered() {
        return Err(pingora_core::Error::new_str("no route for this path"));
      }
    }

    let peer = self
      .upstream_manager
      .select_peer(&upstream_name, None)
      .ok_or_else(|| {
        error!(upstream = %upstream_name, "no healthy backend");
        pingora_core::Error::new_str("no healthy upstream")
      })?;

    ctx.route = Some(route);
    Ok(Box::new(peer))
  }

  async fn upstream_request_filter(
    &self,
    _session: &mut Session,
    upstream_request: &mut RequestHeader,
    ctx: &mut Self::CTX,
  ) -> Result<(), Box<pingora_core::Error>> {
    upstream_request.insert_header("x-request-id", &ctx.request_id)?;
    upstream_request.insert_header("x-forwarded-by", "identity-gateway")?;
    upstream_request.insert_header("x-gateway-version", env!("CARGO_PKG_VERSION"))?;
    if let Some(ip) = &ctx.client_ip {
      upstream_request.insert_header("x-client-ip", ip)?;
    }

    if let Some(route) = &ctx.route {
      let mut path_and_query = route.forward_path().to_string();
      if let Some(query) = upstream_request.uri.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
      }
      if let Ok(uri) = http::Uri::builder().path_and_query(path_and_query).build() {
        upstream_request.set_uri(uri);
      }
    }

    // spec 4.G step 4: strip the original access token and replace it with
    // the short-lived internal token; downstream trusts this signature
    // instead of re-validating against the Session Store.
    upstream_request.remove_header("authorization");
    if let Some(claims) = &ctx.claims {
      upstream_request.insert_header("x-tenant-id", &claims.tenant_id)?;
      match mint_internal_bearer(&self.internal_token_provider, claims, self.config.auth.internal_token_ttl_secs) {
        Ok(token) => {
          upstream_request.insert_header("authorization", format!("Bearer {token}"))?;
        }
        Err(e) => {
          error!(error = %e, "failed to mint internal token");
          return Err(pingora_core::Error::new_str("internal token mint failed"));
        }
      }
    }

    Ok(())
  }

  async fn response_filter(
    &self,
    session: &mut Session,
    upstream_response: &mut ResponseHeader,
    ctx: &mut Self::CTX,
  ) -> Result<(), Box<pingora_core::Error>> {
    let duration = ctx.start_time.map(|t| t.elapsed()).unwrap_or_default();
    let method = session.req_header().method.as_str().to_string();

    if self.is_preflight_request(&method, &session.req_header().headers) {
      if let Some(origin) = &ctx.cors_origin {
        upstream_response.set_status(200).unwrap();
        for (name, value) in self.preflight_headers(origin) {
          upstream_response.insert_header(name, &value)?;
        }
        return Ok(());
      }
    }

    upstream_response.insert_header("x-response-time", &format!("{}ms", duration.as_millis()))?;
    upstream_response.insert_header("x-served-by", "identity-gateway")?;
    upstream_response.insert_header("x-request-id", &ctx.request_id)?;
    upstream_response.insert_header("x-gateway-version", env!("CARGO_PKG_VERSION"))?;

    if let Some(origin) = &ctx.cors_origin {
      upstream_response.insert_header("access-control-allow-origin", origin)?;
      upstream_response.insert_header("access-control-allow-credentials", "true")?;
    }

    if let Some(route) = &ctx.route {
      upstream_response.insert_header("x-upstream", route.upstream_name().as_str())?;
    }

    Ok(())
  }

  async fn logging(&self, session: &mut Session, e: Option<&pingora_core::Error>, ctx: &mut Self::CTX) {
    let duration = ctx.start_time.map(|t| t.elapsed()).unwrap_or_default();
    let status = session.response_written().map(|r| r.status.as_u16()).unwrap_or(0);
    let upstream_name = ctx.route.as_ref().map(|r| r.upstream_name());

    if let Some(error) = e {
      error!(
        request_id = %ctx.request_id,
        upstream = ?upstream_name,
        status = status,
        duration_ms = duration.as_millis(),
        rate_limited = ctx.rate_limited,
        error = %error,
        "gateway request failed"
      );
    } else {
      info!(
        request_id = %ctx.request_id,
        upstream = ?upstream_name,
        status = status,
        duration_ms = duration.as_millis(),
        cache_hit = ctx.cache_hit,
        "gateway request completed"
      );
    }

    self
      .audit_logger
      .log_request_completed(
        ctx.request_id.clone(),
        session.req_header().method.to_string(),
        session.req_header().uri.path().to_string(),
        status,
        duration,
        ctx.claims.as_ref().map(|c| c.user_id.clone()),
        upstream_name.clone(),
      )
      .await;

    if let Some(name) = upstream_name {
      let healthy = status >= 200 && status < 500;
      self.upstream_manager.report_health(&name, "peer", healthy);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_api_path_and_strips_prefix() {
    let route = classify_path("/api/chat/rooms/42");
    assert_eq!(
      route,
      ClassifiedRoute::Api {
        service: "chat".to_string(),
        forward_path: "/rooms/42".to_string(),
      }
    );
    assert_eq!(route.upstream_name(), "chat");
    assert!(route.requires_auth());
  }

  #[test]
  fn login_and_register_are_auth_exempt() {
    assert!(!classify_path("/api/identity/auth/login").requires_auth());
    assert!(!classify_path("/api/identity/auth/register").requires_auth());
    assert!(classify_path("/api/identity/auth/refresh").requires_auth());
  }

  #[test]
  fn classifies_page_path_to_frontend_upstream() {
    let route = classify_path("/page/chat/rooms");
    assert_eq!(route.upstream_name(), "chat-frontend");
    assert_eq!(route.forward_path(), "/rooms");
    assert!(!route.requires_auth());
  }

  #[test]
  fn classifies_upload_path_to_file_service() {
    let route = classify_path("/upload/avatar.png");
    assert_eq!(route.upstream_name(), "file-service");
    assert_eq!(route.forward_path(), "/avatar.png");
  }

  #[test]
  fn anything_else_falls_back_to_slug_service() {
    let route = classify_path("/acme");
    assert_eq!(route.upstream_name(), "slug-service");
    assert_eq!(route.forward_path(), "/acme");
  }

  #[test]
  fn bare_api_prefix_with_no_service_falls_back_to_slug() {
    // "/api/" has no service segment to strip; it isn't a valid api route.
    let route = classify_path("/api/");
    assert_eq!(route.upstream_name(), "slug-service");
  }

  #[tokio::test]
  async fn rate_limit_trips_after_the_configured_threshold() {
    let config = Arc::new(crate::config::testing::create_test_config());
    let upstream_manager = Arc::new(UpstreamManager::new(config.clone()).await.unwrap());
    let proxy = GatewayProxy::new(config, upstream_manager);

    for i in 0..100 {
      let (allowed, remaining) = proxy.check_rate_limit("test-key");
      assert!(allowed, "request {} should be allowed", i + 1);
      assert_eq!(remaining, 99 - i);
    }
    let (allowed, _) = proxy.check_rate_limit("test-key");
    assert!(!allowed, "101st request should be rate limited");
  }

  #[tokio::test]
  async fn cors_origin_validation_matches_configured_origins() {
    let config = Arc::new(crate::config::testing::create_test_config());
    let upstream_manager = Arc::new(UpstreamManager::new(config.clone()).await.unwrap());
    let proxy = GatewayProxy::new(config, upstream_manager);

    assert!(proxy.validate_cors_origin("http://localhost:3000"));
    assert!(!proxy.validate_cors_origin("https://evil.example"));
  }
}
