//! Signed-token primitives for the Token Service (spec 4.F) and the gateway's
//! internal token (spec 4.G, 9 "Token choice"). The access token itself is opaque
//! (see `crate::access_token`) and is never a JWT — only the refresh token and the
//! gateway-minted internal token are signed here.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, TokenValidationError};
use crate::models::ids::{TenantId, UserId};

pub const DEFAULT_JWT_ISSUER: &str = "identity-engine";
pub const DEFAULT_JWT_AUDIENCE: &str = "identity-engine-clients";
pub const DEFAULT_JWT_LEEWAY_SECS: u64 = 30;

pub const ACCESS_TOKEN_DEFAULT_TTL_SECS: i64 = 30 * 60;
pub const REFRESH_TOKEN_DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Short-lived: the internal token is a per-request trust handoff, not a session.
pub const INTERNAL_TOKEN_DEFAULT_TTL_SECS: i64 = 60;

/// Supplies the signing/verification material and policy for JWT-shaped tokens.
/// Implemented by `identity_server`'s config so that HS256 (a shared secret) or
/// RS256 (a PEM keypair, for multi-service deployments) can be selected without
/// touching the signing code (spec 4.F: "HS256 ... or RS256"). This keeps the
/// teacher's `TokenConfigProvider` trait shape while retargeting it off Ed25519.
pub trait TokenConfigProvider: Send + Sync {
  fn algorithm(&self) -> Algorithm;
  fn encoding_key(&self) -> &EncodingKey;
  fn decoding_key(&self) -> &DecodingKey;
  fn leeway_secs(&self) -> u64 {
    DEFAULT_JWT_LEEWAY_SECS
  }
  fn audience(&self) -> &str {
    DEFAULT_JWT_AUDIENCE
  }
  fn issuer(&self) -> &str {
    DEFAULT_JWT_ISSUER
  }
}

/// Build a symmetric (HS256) config from a shared secret — the default deployment
/// shape named by spec 4.F.
pub struct HmacTokenConfig {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
}

impl HmacTokenConfig {
  pub fn from_secret(secret: &[u8]) -> Self {
    Self {
      encoding_key: EncodingKey::from_secret(secret),
      decoding_key: DecodingKey::from_secret(secret),
    }
  }
}

impl TokenConfigProvider for HmacTokenConfig {
  fn algorithm(&self) -> Algorithm {
    Algorithm::HS256
  }
  fn encoding_key(&self) -> &EncodingKey {
    &self.encoding_key
  }
  fn decoding_key(&self) -> &DecodingKey {
    &self.decoding_key
  }
}

/// Build an asymmetric (RS256) config from a PEM keypair, for multi-service
/// deployments where the signer and verifiers are different processes.
pub struct RsaTokenConfig {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
}

impl RsaTokenConfig {
  pub fn from_pem(private_key_pem: &[u8], public_key_pem: &[u8]) -> Result<Self, CoreError> {
    Ok(Self {
      encoding_key: EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| CoreError::Internal(e.to_string()))?,
      decoding_key: DecodingKey::from_rsa_pem(public_key_pem)
        .map_err(|e| CoreError::Internal(e.to_string()))?,
    })
  }
}

impl TokenConfigProvider for RsaTokenConfig {
  fn algorithm(&self) -> Algorithm {
    Algorithm::RS256
  }
  fn encoding_key(&self) -> &EncodingKey {
    &self.encoding_key
  }
  fn decoding_key(&self) -> &DecodingKey {
    &self.decoding_key
  }
}

/// Claims of a refresh token: `{user_id, tenant_id, type=refresh, iat, exp}`
/// (spec 4.F, verbatim shape).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshClaims {
  pub sub: String,
  pub tenant_id: String,
  #[serde(rename = "type")]
  pub token_type: String,
  pub iat: i64,
  pub exp: i64,
  pub aud: String,
  pub iss: String,
}

pub fn sign_refresh_token(
  provider: &dyn TokenConfigProvider,
  user_id: &UserId,
  tenant_id: &TenantId,
  ttl_secs: i64,
) -> Result<(String, chrono::DateTime<Utc>), CoreError> {
  let now = Utc::now();
  let exp = now + chrono::Duration::seconds(ttl_secs);
  let claims = RefreshClaims {
    sub: user_id.0.clone(),
    tenant_id: tenant_id.0.clone(),
    token_type: "refresh".to_string(),
    iat: now.timestamp(),
    exp: exp.timestamp(),
    aud: provider.audience().to_string(),
    iss: provider.issuer().to_string(),
  };
  let header = Header::new(provider.algorithm());
  let token = encode(&header, &claims, provider.encoding_key())
    .map_err(|e| CoreError::Internal(e.to_string()))?;
  Ok((token, exp))
}

/// Validate signature, expiry, and `type=refresh`. Does NOT consult the Credential
/// Store's validity predicate — callers must do that separately (spec 4.F:
/// "Validation checks signature, expiry, type, AND the Credential Store's validity
/// predicate").
pub fn verify_refresh_token(
  provider: &dyn TokenConfigProvider,
  token: &str,
) -> Result<RefreshClaims, CoreError> {
  let mut validation = Validation::new(provider.algorithm());
  validation.set_audience(&[provider.audience()]);
  validation.set_issuer(&[provider.issuer()]);
  validation.leeway = provider.leeway_secs();

  let data = decode::<RefreshClaims>(token, provider.decoding_key(), &validation)?;
  if data.claims.token_type != "refresh" {
    return Err(CoreError::InvalidToken(TokenValidationError::BadSignature));
  }
  Ok(data.claims)
}

/// Claims of the gateway-minted internal token: the validated session plus
/// resolved permissions, short-lived, stateless-verifiable by downstream services
/// without hitting the core again (spec 4.G, 9).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InternalClaims {
  pub user_id: String,
  pub tenant_id: String,
  pub email: Option<String>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
  pub iat: i64,
  pub exp: i64,
  pub aud: String,
  pub iss: String,
}

pub fn mint_internal_token(
  provider: &dyn TokenConfigProvider,
  user_id: &UserId,
  tenant_id: &TenantId,
  email: Option<String>,
  roles: Vec<String>,
  permissions: Vec<String>,
  ttl_secs: i64,
) -> Result<String, CoreError> {
  let now = Utc::now();
  let claims = InternalClaims {
    user_id: user_id.0.clone(),
    tenant_id: tenant_id.0.clone(),
    email,
    roles,
    permissions,
    iat: now.timestamp(),
    exp: (now + chrono::Duration::seconds(ttl_secs)).timestamp(),
    aud: provider.audience().to_string(),
    iss: provider.issuer().to_string(),
  };
  let header = Header::new(provider.algorithm());
  encode(&header, &claims, provider.encoding_key()).map_err(|e| CoreError::Internal(e.to_string()))
}

pub fn verify_internal_token(
  provider: &dyn TokenConfigProvider,
  token: &str,
) -> Result<InternalClaims, CoreError> {
  let mut validation = Validation::new(provider.algorithm());
  validation.set_audience(&[provider.audience()]);
  validation.set_issuer(&[provider.issuer()]);
  validation.leeway = provider.leeway_secs();

  let data = decode::<InternalClaims>(token, provider.decoding_key(), &validation)?;
  Ok(data.claims)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn refresh_token_round_trips() {
    let cfg = HmacTokenConfig::from_secret(b"test-secret-test-secret");
    let (token, _exp) =
      sign_refresh_token(&cfg, &UserId("u1".into()), &TenantId("t1".into()), 3600).unwrap();
    let claims = verify_refresh_token(&cfg, &token).unwrap();
    assert_eq!(claims.sub, "u1");
    assert_eq!(claims.tenant_id, "t1");
    assert_eq!(claims.token_type, "refresh");
  }

  #[test]
  fn expired_refresh_token_fails_verification() {
    let cfg = HmacTokenConfig::from_secret(b"test-secret-test-secret");
    let (token, _exp) =
      sign_refresh_token(&cfg, &UserId("u1".into()), &TenantId("t1".into()), -10).unwrap();
    assert!(verify_refresh_token(&cfg, &token).is_err());
  }

  #[test]
  fn internal_token_round_trips() {
    let cfg = HmacTokenConfig::from_secret(b"test-secret-test-secret");
    let token = mint_internal_token(
      &cfg,
      &UserId("u1".into()),
      &TenantId("t1".into()),
      Some("a@b.c".into()),
      vec!["admin".into()],
      vec!["*".into()],
      60,
    )
    .unwrap();
    let claims = verify_internal_token(&cfg, &token).unwrap();
    assert_eq!(claims.user_id, "u1");
    assert_eq!(claims.permissions, vec!["*".to_string()]);
  }
}
