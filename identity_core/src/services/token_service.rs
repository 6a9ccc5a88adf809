//! The Token Service (spec 4.F): issue the opaque-access/signed-refresh pair
//! atomically, validate, rotate, revoke. Generalized over the three store
//! contracts via trait objects rather than type parameters, since this service
//! is itself shared, by value, between the Login State Machine and the HTTP
//! handlers that expose `/validate` directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access_token::generate_access_token;
use crate::contracts::{CredentialStore, PermissionResolver, SessionStore};
use crate::error::CoreError;
use crate::models::ids::{TenantId, UserId};
use crate::models::jwt::{
  self, REFRESH_TOKEN_DEFAULT_TTL_SECS, TokenConfigProvider, verify_refresh_token,
};
use crate::models::session::SessionBlob;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidatedSession {
  pub user_id: UserId,
  pub tenant_id: TenantId,
  pub email: Option<String>,
  pub roles: Vec<String>,
  pub permissions: Vec<String>,
}

pub struct TokenService {
  credential_store: Arc<dyn CredentialStore>,
  session_store: Arc<dyn SessionStore>,
  permission_resolver: Arc<dyn PermissionResolver>,
  token_config: Arc<dyn TokenConfigProvider>,
}

impl TokenService {
  pub fn new(
    credential_store: Arc<dyn CredentialStore>,
    session_store: Arc<dyn SessionStore>,
    permission_resolver: Arc<dyn PermissionResolver>,
    token_config: Arc<dyn TokenConfigProvider>,
  ) -> Self {
    Self {
      credential_store,
      session_store,
      permission_resolver,
      token_config,
    }
  }

  fn session_key(access_token: &str) -> String {
    format!("session:{access_token}")
  }

  /// `GenerateTokenPair` (spec 4.F). The session write and the refresh-credential
  /// write run concurrently and both must complete; a session-write failure is
  /// fatal, a refresh-credential-write failure is logged but non-fatal (spec 4.F,
  /// 5).
  pub async fn generate_token_pair(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    email: Option<String>,
    roles: Vec<String>,
    session_timeout_secs: i64,
  ) -> Result<TokenPair, CoreError> {
    let access_token = generate_access_token();
    let now = Utc::now();
    let session = SessionBlob {
      user_id: user_id.clone(),
      tenant_id: tenant_id.clone(),
      email,
      roles,
      created_at: now,
      expires_at: now + chrono::Duration::seconds(session_timeout_secs),
    };
    let session_bytes =
      serde_json::to_vec(&session).map_err(|e| CoreError::Internal(e.to_string()))?;

    let (refresh_token, refresh_expires_at) = jwt::sign_refresh_token(
      self.token_config.as_ref(),
      user_id,
      tenant_id,
      REFRESH_TOKEN_DEFAULT_TTL_SECS,
    )?;

    let session_write = self.session_store.set(
      &Self::session_key(&access_token),
      &session_bytes,
      session_timeout_secs,
    );
    let credential_write = self.credential_store.create_refresh_credential(
      user_id,
      tenant_id,
      &refresh_token,
      refresh_expires_at,
    );

    let (session_result, credential_result) = tokio::join!(session_write, credential_write);
    session_result?;
    if let Err(e) = credential_result {
      tracing::warn!(error = %e, "refresh credential write failed; refresh will fail with unauthenticated, user must re-login");
    }

    Ok(TokenPair {
      access_token,
      refresh_token,
      expires_in: session_timeout_secs,
    })
  }

  /// `VerifyToken` (spec 4.F). A session-store miss, an expired session, a
  /// deactivated user, or a revoked membership all fail with `unauthenticated` /
  /// `forbidden` per the error taxonomy — callers surface them identically to avoid
  /// leaking which check failed.
  pub async fn verify_token(&self, access_token: &str) -> Result<ValidatedSession, CoreError> {
    let key = Self::session_key(access_token);
    let Some(bytes) = self.session_store.get(&key).await? else {
      return Err(CoreError::Unauthenticated);
    };
    let session: SessionBlob =
      serde_json::from_slice(&bytes).map_err(|e| CoreError::Internal(e.to_string()))?;

    if session.expires_at <= Utc::now() {
      let _ = self.session_store.delete(&key).await;
      return Err(CoreError::Unauthenticated);
    }

    let user = self
      .credential_store
      .find_user_by_id(&session.user_id)
      .await?
      .ok_or(CoreError::Unauthenticated)?;
    if !user.is_active {
      return Err(CoreError::Unauthenticated);
    }

    let membership = self
      .credential_store
      .find_membership(&session.user_id, &session.tenant_id)
      .await?;
    let Some(membership) = membership else {
      return Err(CoreError::Unauthenticated);
    };
    if !membership.is_active {
      return Err(CoreError::Unauthenticated);
    }

    let resolution = self
      .permission_resolver
      .resolve_permissions(&session.user_id, &session.tenant_id)
      .await?;

    Ok(ValidatedSession {
      user_id: session.user_id,
      tenant_id: session.tenant_id,
      email: session.email,
      roles: session.roles,
      permissions: resolution.permissions,
    })
  }

  /// `RefreshToken` (spec 4.F). Ordering follows spec 5 for document stores without
  /// multi-document transactions: (1) validate old, (2) write new refresh
  /// credential, (3) write new session, (4) revoke old refresh credential. A crash
  /// between (3) and (4) leaves one replay-available old token, bounded by the
  /// refresh expiry — an accepted window per spec.
  pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, CoreError> {
    let claims = verify_refresh_token(self.token_config.as_ref(), refresh_token)?;

    let credential = self
      .credential_store
      .find_valid_refresh_credential(refresh_token)
      .await?
      .ok_or(CoreError::Unauthenticated)?;

    let user_id = UserId(claims.sub);
    let tenant_id = TenantId(claims.tenant_id);
    debug_assert_eq!(credential.user_id, user_id);
    debug_assert_eq!(credential.tenant_id, tenant_id);

    let user = self
      .credential_store
      .find_user_by_id(&user_id)
      .await?
      .ok_or(CoreError::Unauthenticated)?;
    if !user.is_active {
      return Err(CoreError::Unauthenticated);
    }
    let membership = self
      .credential_store
      .find_membership(&user_id, &tenant_id)
      .await?
      .filter(|m| m.is_active)
      .ok_or(CoreError::Unauthenticated)?;

    // The refreshed session's TTL follows the tenant's configured timeout
    // (spec 3), not whatever the caller guessed before the tenant was known
    // from the token's own claims.
    let config = self.credential_store.get_tenant_login_config(&tenant_id).await?;
    let session_timeout_secs = config.session_timeout_minutes * 60;

    let new_pair = self
      .generate_token_pair(
        &user_id,
        &tenant_id,
        user.email.clone(),
        membership.roles.clone(),
        session_timeout_secs,
      )
      .await?;

    // Revoke the presented token last (step 4): a crash before this point leaves
    // the old token replayable, a window accepted by spec 5.
    self
      .credential_store
      .revoke_refresh_credential(refresh_token)
      .await?;

    Ok(new_pair)
  }

  /// `Logout` (spec 4.F). Best-effort refresh-credential revocation; revocation
  /// failure MUST NOT fail logout.
  pub async fn logout(&self, access_token: &str) -> Result<(), CoreError> {
    let key = Self::session_key(access_token);
    if let Some(bytes) = self.session_store.get(&key).await? {
      if let Ok(session) = serde_json::from_slice::<SessionBlob>(&bytes) {
        self.permission_resolver.invalidate(&session.user_id, &session.tenant_id).await;
        if let Err(e) = self
          .credential_store
          .revoke_for_tenant(&session.user_id, &session.tenant_id)
          .await
        {
          tracing::warn!(user_id = %session.user_id, tenant_id = %session.tenant_id, error = %e, "refresh credential revocation on logout failed");
        }
      }
    }
    self.session_store.delete(&key).await?;
    Ok(())
  }

  /// Fire-and-forget last-login update, bounded by its own 5-second deadline
  /// (spec 4.E, 5: "MUST NOT extend the request deadline").
  pub fn update_last_login_detached(self: &Arc<Self>, user_id: UserId) {
    let store = self.credential_store.clone();
    tokio::spawn(async move {
      let result = tokio::time::timeout(
        Duration::from_secs(5),
        store.update_last_login(&user_id, Utc::now()),
      )
      .await;
      if let Err(elapsed) = result {
        tracing::warn!(%user_id, %elapsed, "update_last_login timed out");
      } else if let Ok(Err(e)) = result {
        tracing::warn!(%user_id, error = %e, "update_last_login failed");
      }
    });
  }
}
