pub mod ids;
pub mod jwt;
pub mod lockout;
pub mod login_attempt;
pub mod oauth_account;
pub mod password_policy;
pub mod permission;
pub mod refresh_credential;
pub mod role;
pub mod session;
pub mod tenant;
pub mod user;

pub use ids::{RoleId, TenantId, UserId};
pub use lockout::UserLockout;
pub use login_attempt::LoginAttempt;
pub use oauth_account::{OAuthAccount, OAuthLinkRequest};
pub use refresh_credential::RefreshCredential;
pub use role::Role;
pub use session::SessionBlob;
pub use tenant::{Tenant, TenantBranding, TenantLoginConfig, UserTenantMembership};
pub use user::{
  IdentifierKind, NewUser, User, detect_identifier_kind, hashed_password, verify_password,
};
