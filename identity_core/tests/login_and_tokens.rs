//! End-to-end coverage of the Login State Machine and Token Service wired together
//! through the in-memory fakes (spec 8 "Concrete end-to-end scenarios"). Each test
//! name below corresponds to a numbered scenario in that section.

use std::sync::Arc;

use chrono::Utc;
use identity_core::models::jwt::HmacTokenConfig;
use identity_core::{
  InMemoryCredentialStore, InMemoryPermissionResolver, InMemorySessionStore, LoginOutcome,
  LoginStateMachine, NewUser, RoleId, TenantId, TenantLoginConfig, TokenService, User,
};
use identity_core::contracts::CredentialStore;
use identity_core::error::{CoreError, ForbiddenReason};
use identity_core::models::role::Role;
use identity_core::models::user::IdentifierKind;

fn harness() -> (Arc<InMemoryCredentialStore>, Arc<LoginStateMachine>, Arc<TokenService>) {
  let credential_store = Arc::new(InMemoryCredentialStore::new());
  let session_store = Arc::new(InMemorySessionStore::new());
  let permission_resolver = Arc::new(InMemoryPermissionResolver::new(credential_store.clone()));
  let token_config = Arc::new(HmacTokenConfig::from_secret(b"test-suite-secret-value"));

  let token_service = Arc::new(TokenService::new(
    credential_store.clone(),
    session_store.clone(),
    permission_resolver.clone(),
    token_config.clone(),
  ));
  let login_state_machine = Arc::new(LoginStateMachine::new(
    credential_store.clone(),
    token_service.clone(),
  ));
  (credential_store, login_state_machine, token_service)
}

async fn seed_user(
  store: &InMemoryCredentialStore,
  email: Option<&str>,
  username: Option<&str>,
  password: &str,
) -> User {
  let password_hash = identity_core::hashed_password(password).unwrap();
  store
    .create_user(&NewUser {
      email: email.map(String::from),
      username: username.map(String::from),
      phone: None,
      doc_number: None,
      password: password_hash,
    })
    .await
    .unwrap()
}

fn default_config(tenant_id: &TenantId) -> TenantLoginConfig {
  TenantLoginConfig::default_sentinel(tenant_id.clone())
}

#[tokio::test]
async fn scenario_1_email_login_on_username_only_tenant_is_forbidden() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("a@b.c"), Some("alice"), "pw123456").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();

  let mut config = default_config(&tenant);
  config.allowed_identifiers = vec![IdentifierKind::Username];
  store.seed_tenant_config(config);

  let err = login.login("a@b.c", "pw123456", &tenant, None).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Forbidden(ForbiddenReason::IdentifierTypeNotAllowed)
  ));

  let outcome = login.login("alice", "pw123456", &tenant, None).await.unwrap();
  assert!(matches!(outcome, LoginOutcome::Authorized(_)));
}

#[tokio::test]
async fn scenario_2_cross_tenant_isolation() {
  let (store, login, _tokens) = harness();
  let t1 = TenantId("T1".into());
  let t2 = TenantId("T2".into());
  let user = seed_user(&store, Some("u@x.io"), None, "pw123456").await;
  store.add_membership(&user.id, &t1, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&t1));
  store.seed_tenant_config(default_config(&t2));

  let err = login.login("u@x.io", "pw123456", &t2, None).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Forbidden(ForbiddenReason::NoTenantAccess)
  ));

  let ok = login.login("u@x.io", "pw123456", &t1, None).await;
  assert!(matches!(ok, Ok(LoginOutcome::Authorized(_))));
}

#[tokio::test]
async fn scenario_3_lockout_after_max_attempts_blocks_even_correct_password() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "rightpw1").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  let mut config = default_config(&tenant);
  config.max_login_attempts = 3;
  config.lockout_duration_minutes = 15;
  store.seed_tenant_config(config);

  for _ in 0..3 {
    let err = login.login("u@x.io", "wrongpw", &tenant, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Unauthenticated));
  }

  let err = login.login("u@x.io", "wrongpw", &tenant, None).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Forbidden(ForbiddenReason::Locked { .. })
  ));

  // A concurrent attempt with the *correct* password during the lockout window
  // also fails, bypassing the password check entirely (spec 4.E [NOT_LOCKED]).
  let err = login.login("u@x.io", "rightpw1", &tenant, None).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Forbidden(ForbiddenReason::Locked { .. })
  ));
}

#[tokio::test]
async fn scenario_3b_lockout_in_the_past_proceeds_as_normal() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "rightpw1").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));

  store
    .create_lockout(identity_core::UserLockout {
      user_id: user.id.clone(),
      tenant_id: tenant.clone(),
      locked_at: Utc::now() - chrono::Duration::hours(1),
      unlock_at: Utc::now() - chrono::Duration::minutes(1),
      reason: "expired lockout".to_string(),
      is_active: true,
    })
    .await
    .unwrap();

  let outcome = login.login("u@x.io", "rightpw1", &tenant, None).await.unwrap();
  assert!(matches!(outcome, LoginOutcome::Authorized(_)));
}

#[tokio::test]
async fn scenario_4_refresh_rotation_and_replay_rejection() {
  let (store, login, tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "pw123456").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));

  let LoginOutcome::Authorized(resp1) = login.login("u@x.io", "pw123456", &tenant, None).await.unwrap()
  else {
    panic!("expected authorized");
  };
  let a1 = resp1.tokens.access_token.clone();
  let r1 = resp1.tokens.refresh_token.clone();

  // Immediately following login, the issued access token verifies.
  tokens.verify_token(&a1).await.unwrap();

  let pair2 = tokens.refresh_token(&r1).await.unwrap();
  assert_ne!(pair2.refresh_token, r1);

  // The old access token is untouched by refresh and still verifies until its
  // own session TTL expires.
  tokens.verify_token(&a1).await.unwrap();

  // Replaying the now-revoked refresh token fails.
  let err = tokens.refresh_token(&r1).await.unwrap_err();
  assert!(matches!(err, CoreError::Unauthenticated));

  // The newly issued refresh token works.
  let pair3 = tokens.refresh_token(&pair2.refresh_token).await.unwrap();
  assert_ne!(pair3.refresh_token, pair2.refresh_token);
}

#[tokio::test]
async fn scenario_logout_invalidates_access_token() {
  let (store, login, tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "pw123456").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));

  let LoginOutcome::Authorized(resp) = login.login("u@x.io", "pw123456", &tenant, None).await.unwrap()
  else {
    panic!("expected authorized");
  };
  let access_token = resp.tokens.access_token.clone();

  tokens.verify_token(&access_token).await.unwrap();
  tokens.logout(&access_token).await.unwrap();
  let err = tokens.verify_token(&access_token).await.unwrap_err();
  assert!(matches!(err, CoreError::Unauthenticated));
}

#[tokio::test]
async fn scenario_5_wildcard_permission_resolution_through_the_login_roles() {
  let (store, login, tokens) = harness();
  let tenant = TenantId("T".into());
  let admin = seed_user(&store, Some("admin@x.io"), None, "pw123456").await;
  store
    .add_membership(&admin.id, &tenant, vec!["admin".into()])
    .await
    .unwrap();
  store.seed_tenant_config(default_config(&tenant));
  store.seed_role(Role {
    id: RoleId("role-admin".into()),
    name: "admin".into(),
    tenant_id: None,
    permissions: vec!["user.*".into()],
    is_system: false,
    created_at: Utc::now(),
    updated_at: Utc::now(),
  });

  let LoginOutcome::Authorized(resp) = login
    .login("admin@x.io", "pw123456", &tenant, None)
    .await
    .unwrap()
  else {
    panic!("expected authorized");
  };

  let validated = tokens.verify_token(&resp.tokens.access_token).await.unwrap();
  assert!(validated.permissions.contains(&"user.*".to_string()));
  assert!(identity_core::models::permission::check_permission(
    &validated.permissions,
    "user.read"
  ));
  assert!(!identity_core::models::permission::check_permission(
    &validated.permissions,
    "billing.read"
  ));
}

#[tokio::test]
async fn register_then_login_succeeds_and_is_idempotent_on_membership() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  store.seed_tenant_config(default_config(&tenant));

  let outcome = login
    .register(
      NewUser {
        email: Some("new@x.io".into()),
        username: None,
        phone: None,
        doc_number: None,
        password: "pw123456".into(),
      },
      &tenant,
      vec!["viewer".into()],
    )
    .await
    .unwrap();
  assert!(matches!(outcome, LoginOutcome::Authorized(_)));

  let outcome = login.login("new@x.io", "pw123456", &tenant, None).await.unwrap();
  assert!(matches!(outcome, LoginOutcome::Authorized(_)));
}

#[tokio::test]
async fn register_rejects_duplicate_identifier_with_conflict() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  store.seed_tenant_config(default_config(&tenant));
  seed_user(&store, Some("dup@x.io"), None, "pw123456").await;

  let err = login
    .register(
      NewUser {
        email: Some("dup@x.io".into()),
        username: None,
        phone: None,
        doc_number: None,
        password: "pw123456".into(),
      },
      &tenant,
      vec![],
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn deactivated_membership_fails_verification_even_with_a_live_session() {
  let (store, login, tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "pw123456").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));

  let LoginOutcome::Authorized(resp) = login.login("u@x.io", "pw123456", &tenant, None).await.unwrap()
  else {
    panic!("expected authorized");
  };

  tokens.verify_token(&resp.tokens.access_token).await.unwrap();
  store.deactivate_membership(&user.id, &tenant).await.unwrap();

  let err = tokens.verify_token(&resp.tokens.access_token).await.unwrap_err();
  assert!(matches!(err, CoreError::Unauthenticated));
}

#[tokio::test]
async fn deactivated_user_fails_login_with_account_deactivated() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "pw123456").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));
  store.set_user_active(&user.id, false).await.unwrap();

  let err = login.login("u@x.io", "pw123456", &tenant, None).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::Forbidden(ForbiddenReason::AccountDeactivated)
  ));
}

#[tokio::test]
async fn unknown_identifier_and_bad_password_are_indistinguishable() {
  let (store, login, _tokens) = harness();
  let tenant = TenantId("T".into());
  let user = seed_user(&store, Some("u@x.io"), None, "rightpw1").await;
  store.add_membership(&user.id, &tenant, vec!["viewer".into()]).await.unwrap();
  store.seed_tenant_config(default_config(&tenant));

  let not_found = login.login("nobody@x.io", "whatever", &tenant, None).await.unwrap_err();
  let bad_password = login.login("u@x.io", "wrongpw", &tenant, None).await.unwrap_err();

  assert!(matches!(not_found, CoreError::Unauthenticated));
  assert!(matches!(bad_password, CoreError::Unauthenticated));
}
