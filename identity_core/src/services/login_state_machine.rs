//! The Login State Machine (spec 4.E): identifier, user, policy, membership,
//! password, failure-accounting, token issuance, as a single linear async
//! function with early returns. There is no branching control flow that revisits
//! a state, so the state names are documented as comments on the corresponding
//! steps rather than reified as an enum (SPEC_FULL.md 4.E).

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::contracts::CredentialStore;
use crate::error::{CoreError, ForbiddenReason};
use crate::models::ids::TenantId;
use crate::models::login_attempt::LoginAttempt;
use crate::models::lockout::UserLockout;
use crate::models::oauth_account::{OAuthAccount, OAuthLinkRequest};
use crate::models::password_policy::evaluate_password_policy;
use crate::models::user::{NewUser, detect_identifier_kind, hashed_password, verify_password};
use crate::services::token_service::{TokenPair, TokenService};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
  pub tokens: TokenPair,
  pub user_id: String,
  pub email: Option<String>,
  pub tenant_id: String,
  pub roles: Vec<String>,
}

/// Issued instead of `LoginResponse` when `TenantLoginConfig.require_2fa` is set
/// (SPEC_FULL.md 4.E MFA resolution). Completing MFA is an external collaborator
/// step, out of scope here; it exchanges `mfa_token` + a TOTP code for the same
/// `AUTHORIZED` continuation this module would otherwise have taken.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaRequired {
  pub mfa_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum LoginOutcome {
  Authorized(LoginResponse),
  MfaRequired(MfaRequired),
}

pub struct LoginStateMachine {
  credential_store: Arc<dyn CredentialStore>,
  token_service: Arc<TokenService>,
}

impl LoginStateMachine {
  pub fn new(credential_store: Arc<dyn CredentialStore>, token_service: Arc<TokenService>) -> Self {
    Self {
      credential_store,
      token_service,
    }
  }

  /// `Login(identifier, password, tenant_id)` (spec 4.E).
  pub async fn login(
    &self,
    identifier: &str,
    password: &str,
    tenant_id: &TenantId,
    ip: Option<String>,
  ) -> Result<LoginOutcome, CoreError> {
    // [POLICY_LOADED]
    let config = self.credential_store.get_tenant_login_config(tenant_id).await?;

    // [USER_FOUND] — user-not-found and bad-password must be indistinguishable.
    let user = self
      .credential_store
      .find_user_by_identifier(identifier)
      .await?
      .ok_or(CoreError::Unauthenticated)?;

    // [IDENTIFIER_ALLOWED]
    let kind = detect_identifier_kind(identifier, &user).ok_or(CoreError::Unauthenticated)?;
    if !config.allowed_identifiers.contains(&kind) {
      return Err(CoreError::Forbidden(ForbiddenReason::IdentifierTypeNotAllowed));
    }

    // [MEMBERSHIP_OK]
    let membership = self
      .credential_store
      .find_membership(&user.id, tenant_id)
      .await?
      .filter(|m| m.is_active)
      .ok_or(CoreError::Forbidden(ForbiddenReason::NoTenantAccess))?;

    // [NOT_LOCKED]
    if let Some(lockout) = self
      .credential_store
      .find_active_lockout(&user.id, tenant_id)
      .await?
    {
      let now = Utc::now();
      if lockout.is_in_effect(now) {
        let retry_after_seconds = (lockout.unlock_at - now).num_seconds().max(0);
        return Err(CoreError::Forbidden(ForbiddenReason::Locked {
          retry_after_seconds,
        }));
      }
    }

    // [ACCOUNT_ACTIVE]
    if !user.is_active {
      return Err(CoreError::Forbidden(ForbiddenReason::AccountDeactivated));
    }

    // [PASSWORD_OK] — constant-time comparison inside verify_password.
    let password_ok = verify_password(password, &user.password_hash)?;
    if !password_ok {
      self.record_failure_and_maybe_lock(identifier, tenant_id, &user.id, &config, ip).await?;
      return Err(CoreError::Unauthenticated);
    }

    self
      .credential_store
      .record_login_attempt(LoginAttempt {
        identifier: identifier.to_string(),
        tenant_id: tenant_id.clone(),
        ip,
        success: true,
        timestamp: Utc::now(),
      })
      .await?;

    if config.require_2fa {
      // An orthogonal step issuing a temporary token; TOTP verification itself is
      // an external collaborator (spec 1 non-goals: "MFA/TOTP setup UX").
      let mfa_token = crate::access_token::generate_access_token();
      return Ok(LoginOutcome::MfaRequired(MfaRequired { mfa_token }));
    }

    // [AUTHORIZED]
    self.issue_and_respond(user, membership, tenant_id, &config).await
  }

  async fn record_failure_and_maybe_lock(
    &self,
    identifier: &str,
    tenant_id: &TenantId,
    user_id: &crate::models::ids::UserId,
    config: &crate::models::tenant::TenantLoginConfig,
    ip: Option<String>,
  ) -> Result<(), CoreError> {
    let now = Utc::now();
    self
      .credential_store
      .record_login_attempt(LoginAttempt {
        identifier: identifier.to_string(),
        tenant_id: tenant_id.clone(),
        ip,
        success: false,
        timestamp: now,
      })
      .await?;

    let window_start = now - ChronoDuration::minutes(config.lockout_duration_minutes.max(1));
    let recent = self
      .credential_store
      .find_recent_attempts(identifier, tenant_id, window_start)
      .await?;
    let failures = recent.iter().filter(|a| !a.success).count() as u32;

    if failures >= config.max_login_attempts {
      self
        .credential_store
        .create_lockout(UserLockout {
          user_id: user_id.clone(),
          tenant_id: tenant_id.clone(),
          locked_at: now,
          unlock_at: now + ChronoDuration::minutes(config.lockout_duration_minutes),
          reason: "max_login_attempts exceeded".to_string(),
          is_active: true,
        })
        .await?;
    }
    Ok(())
  }

  async fn issue_and_respond(
    &self,
    user: crate::models::user::User,
    membership: crate::models::tenant::UserTenantMembership,
    tenant_id: &TenantId,
    config: &crate::models::tenant::TenantLoginConfig,
  ) -> Result<LoginOutcome, CoreError> {
    let tokens = self
      .token_service
      .generate_token_pair(
        &user.id,
        tenant_id,
        user.email.clone(),
        membership.roles.clone(),
        config.session_timeout_minutes * 60,
      )
      .await?;

    self.token_service.update_last_login_detached(user.id.clone());

    Ok(LoginOutcome::Authorized(LoginResponse {
      tokens,
      user_id: user.id.0,
      email: user.email,
      tenant_id: tenant_id.0.clone(),
      roles: membership.roles,
    }))
  }

  /// Registration (spec 4.E "Registration"): same policy loader, enforces
  /// `allow_registration`, runs identifier-conflict checks, hashes the password,
  /// creates the user then the initial membership. If membership creation fails
  /// after user creation, the inconsistency is logged and the error is propagated
  /// to the caller; a retry against the same identifier will find the user already
  /// created and the store's membership uniqueness constraint makes a second
  /// `add_membership` call idempotent.
  pub async fn register(
    &self,
    new_user: NewUser,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<LoginOutcome, CoreError> {
    let config = self.credential_store.get_tenant_login_config(tenant_id).await?;
    if !config.allow_registration {
      return Err(CoreError::Forbidden(ForbiddenReason::NoTenantAccess));
    }
    if !new_user.has_identifier() {
      return Err(CoreError::InvalidRequest(
        "at least one identifier is required".to_string(),
      ));
    }
    evaluate_password_policy(&new_user.password, &config).map_err(CoreError::PolicyViolation)?;

    let password_hash = hashed_password(&new_user.password)?;
    let mut to_create = new_user;
    to_create.password = password_hash;

    let user = self.credential_store.create_user(&to_create).await?;

    let membership = match self
      .credential_store
      .add_membership(&user.id, tenant_id, roles)
      .await
    {
      Ok(m) => m,
      Err(e) => {
        tracing::error!(
          user_id = %user.id,
          tenant_id = %tenant_id,
          error = %e,
          "membership creation failed after user creation; next login will surface no_tenant_access"
        );
        return Err(e);
      }
    };

    self.issue_and_respond(user, membership, tenant_id, &config).await
  }

  /// OAuth account-linking login (spec 6 "OAuth collaborator contract"): the
  /// provider handshake itself already happened out-of-process; this finds or
  /// creates the `OAuthAccount` it resulted in and issues a token pair the same
  /// way `login`/`register` do. An existing link requires an active membership
  /// in the requested tenant just like password login; an unlinked account is
  /// provisioned under the same `allow_registration` gate as `register`.
  pub async fn oauth_login(&self, req: OAuthLinkRequest) -> Result<LoginOutcome, CoreError> {
    let config = self.credential_store.get_tenant_login_config(&req.tenant_id).await?;

    if let Some(existing) = self
      .credential_store
      .find_oauth_account(&req.provider, &req.provider_id)
      .await?
    {
      let user = self
        .credential_store
        .find_user_by_id(&existing.user_id)
        .await?
        .ok_or(CoreError::Unauthenticated)?;
      if !user.is_active {
        return Err(CoreError::Forbidden(ForbiddenReason::AccountDeactivated));
      }
      let membership = self
        .credential_store
        .find_membership(&user.id, &req.tenant_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or(CoreError::Forbidden(ForbiddenReason::NoTenantAccess))?;

      return self.issue_and_respond(user, membership, &req.tenant_id, &config).await;
    }

    if !config.allow_registration {
      return Err(CoreError::Forbidden(ForbiddenReason::NoTenantAccess));
    }

    // No password is ever presented for an OAuth-provisioned account; a random
    // one is hashed and stored so the row still satisfies the store's
    // not-null password_hash column, but it can never be guessed or used to
    // log in via `login`.
    let random_password = crate::access_token::generate_access_token();
    let password_hash = hashed_password(&random_password)?;
    let new_user = NewUser {
      email: req.email.clone(),
      username: None,
      phone: None,
      doc_number: None,
      password: password_hash,
    };
    if !new_user.has_identifier() {
      return Err(CoreError::InvalidRequest(
        "oauth provider did not supply an email to link".to_string(),
      ));
    }

    let user = self.credential_store.create_user(&new_user).await?;
    self
      .credential_store
      .link_oauth_account(OAuthAccount {
        user_id: user.id.clone(),
        provider: req.provider,
        provider_id: req.provider_id,
        email: req.email.clone(),
      })
      .await?;
    let membership = self
      .credential_store
      .add_membership(&user.id, &req.tenant_id, Vec::new())
      .await?;

    self.issue_and_respond(user, membership, &req.tenant_id, &config).await
  }
}
