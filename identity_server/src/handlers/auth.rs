//! The five HTTP operations of the auth surface (spec 6):
//! `register`, `login`, `refresh`, `logout`, `validate`. Each handler does request
//! parsing/validation and response shaping only; all state-machine logic lives in
//! `identity_core::services`.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Json};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use identity_core::error::CoreError;
use identity_core::models::ids::TenantId;
use identity_core::models::oauth_account::OAuthLinkRequest;
use identity_core::models::user::NewUser;
use identity_core::services::{LoginOutcome, TokenPair};

use crate::error::AppError;
use crate::rate_limiter::RateLimitEndpoint;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
  #[validate(email)]
  pub email: Option<String>,
  pub username: Option<String>,
  pub phone: Option<String>,
  pub doc_number: Option<String>,
  #[validate(length(min = 1))]
  pub password: String,
  #[validate(length(min = 1))]
  pub tenant_id: String,
  #[serde(default)]
  pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
  #[validate(length(min = 1))]
  pub identifier: String,
  #[validate(length(min = 1))]
  pub password: String,
  #[validate(length(min = 1))]
  pub tenant_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
  #[validate(length(min = 1))]
  pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
  pub id: String,
  pub email: Option<String>,
  pub tenant_id: String,
  pub roles: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub token_type: &'static str,
  pub expires_in: i64,
  pub user: UserSummary,
}

impl AuthResponse {
  fn from_tokens(tokens: TokenPair, user_id: String, email: Option<String>, tenant_id: String, roles: Vec<String>) -> Self {
    Self {
      access_token: tokens.access_token,
      refresh_token: tokens.refresh_token,
      token_type: "Bearer",
      expires_in: tokens.expires_in,
      user: UserSummary {
        id: user_id,
        email,
        tenant_id,
        roles,
      },
    }
  }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaRequiredResponse {
  pub mfa_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LoginResponseBody {
  Authorized(AuthResponse),
  MfaRequired(MfaRequiredResponse),
}

fn outcome_to_body(outcome: LoginOutcome) -> LoginResponseBody {
  match outcome {
    LoginOutcome::Authorized(resp) => LoginResponseBody::Authorized(AuthResponse::from_tokens(
      resp.tokens,
      resp.user_id,
      resp.email,
      resp.tenant_id,
      resp.roles,
    )),
    LoginOutcome::MfaRequired(mfa) => {
      LoginResponseBody::MfaRequired(MfaRequiredResponse { mfa_token: mfa.mfa_token })
    }
  }
}

fn client_ip(addr: &SocketAddr) -> String {
  addr.ip().to_string()
}

fn validation_err(e: validator::ValidationErrors) -> AppError {
  AppError::Core(CoreError::InvalidRequest(e.to_string()))
}

/// `POST /api/v1/auth/register` (spec 6).
pub async fn register_handler(
  State(state): State<AppState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
  req.validate().map_err(validation_err)?;

  state
    .rate_limiter
    .check(
      RateLimitEndpoint::Register,
      &client_ip(&addr),
      state.config.rate_limiting.register,
    )
    .await?;

  let tenant_id = TenantId(req.tenant_id);
  let new_user = NewUser {
    email: req.email,
    username: req.username,
    phone: req.phone,
    doc_number: req.doc_number,
    password: req.password,
  };

  let outcome = state
    .login_state_machine
    .register(new_user, &tenant_id, req.roles)
    .await?;

  Ok(Json(outcome_to_body(outcome)))
}

/// `POST /api/v1/auth/login` (spec 6).
pub async fn login_handler(
  State(state): State<AppState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
  req.validate().map_err(validation_err)?;

  let ip = client_ip(&addr);
  state
    .rate_limiter
    .check(RateLimitEndpoint::Login, &ip, state.config.rate_limiting.login)
    .await?;

  let tenant_id = TenantId(req.tenant_id);
  let outcome = state
    .login_state_machine
    .login(&req.identifier, &req.password, &tenant_id, Some(ip))
    .await?;

  Ok(Json(outcome_to_body(outcome)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OAuthLoginRequest {
  #[validate(length(min = 1))]
  pub provider: String,
  #[validate(length(min = 1))]
  pub provider_id: String,
  pub email: Option<String>,
  #[validate(length(min = 1))]
  pub tenant_id: String,
}

/// `POST /api/v1/auth/oauth/callback` (spec 6 "OAuth collaborator contract"):
/// the provider handshake already happened upstream of this engine; this is the
/// post-exchange account-linking step.
pub async fn oauth_callback_handler(
  State(state): State<AppState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(req): Json<OAuthLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
  req.validate().map_err(validation_err)?;

  state
    .rate_limiter
    .check(
      RateLimitEndpoint::OAuthCallback,
      &client_ip(&addr),
      state.config.rate_limiting.oauth_callback,
    )
    .await?;

  let outcome = state
    .login_state_machine
    .oauth_login(OAuthLinkRequest {
      provider: req.provider,
      provider_id: req.provider_id,
      email: req.email,
      tenant_id: TenantId(req.tenant_id),
    })
    .await?;

  Ok(Json(outcome_to_body(outcome)))
}

/// `POST /api/v1/auth/refresh` (spec 6).
pub async fn refresh_handler(
  State(state): State<AppState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
  req.validate().map_err(validation_err)?;

  state
    .rate_limiter
    .check(
      RateLimitEndpoint::Refresh,
      &client_ip(&addr),
      state.config.rate_limiting.refresh,
    )
    .await?;

  let tokens = state.token_service.refresh_token(&req.refresh_token).await?;

  let session = state.token_service.verify_token(&tokens.access_token).await?;
  Ok(Json(AuthResponse::from_tokens(
    tokens,
    session.user_id.0,
    session.email,
    session.tenant_id.0,
    session.roles,
  )))
}

/// `POST /api/v1/auth/logout` (spec 6). Idempotent: an already-expired or unknown
/// access token still returns success.
pub async fn logout_handler(
  State(state): State<AppState>,
  TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<impl IntoResponse, AppError> {
  state.token_service.logout(auth.token()).await?;
  Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateRequest {
  #[validate(length(min = 1))]
  pub access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateResponse {
  pub user_id: String,
  pub tenant_id: String,
  pub email: Option<String>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
}

/// `POST /api/v1/auth/validate` (spec 6): unauthenticated itself (the token travels
/// in the body, not a header) — this is the gateway's sole upstream call on a
/// local-cache miss (spec 4.G).
pub async fn validate_handler(
  State(state): State<AppState>,
  Json(req): Json<ValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
  req.validate().map_err(validation_err)?;

  let session = state.token_service.verify_token(&req.access_token).await?;
  Ok(Json(ValidateResponse {
    user_id: session.user_id.0,
    tenant_id: session.tenant_id.0,
    email: session.email,
    roles: session.roles,
    permissions: session.permissions,
  }))
}
