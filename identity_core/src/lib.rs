pub mod access_token;
pub mod contracts;
pub mod error;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod testing;

pub use contracts::{
  CredentialStore, PermissionCache, PermissionResolution, PermissionResolver, SessionStore,
};
pub use error::{CoreError, ErrorMapper, ForbiddenReason, PasswordPolicyRule, TokenValidationError};
pub use models::{
  IdentifierKind, LoginAttempt, NewUser, OAuthAccount, OAuthLinkRequest, RefreshCredential, Role,
  RoleId, SessionBlob, Tenant, TenantBranding, TenantId, TenantLoginConfig, User, UserId,
  UserLockout, UserTenantMembership, detect_identifier_kind, hashed_password, verify_password,
};
pub use services::{
  LoginOutcome, LoginResponse, LoginStateMachine, MfaRequired, TokenPair, TokenService,
  ValidatedSession,
};
pub use testing::{InMemoryCredentialStore, InMemoryPermissionResolver, InMemorySessionStore};
