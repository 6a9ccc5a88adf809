use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ids::UserId;

/// Links an external identity provider account to a user. `(provider, provider_id)`
/// is unique and points to at most one user (spec 3: "OAuthAccount").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OAuthAccount {
  pub user_id: UserId,
  pub provider: String,
  pub provider_id: String,
  pub email: Option<String>,
}

/// What the OAuth collaborator presents to the core after completing the provider
/// handshake (spec 6: "OAuth collaborator contract"). The handshake itself is out
/// of scope; this is the post-exchange account-linking contract.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OAuthLinkRequest {
  pub provider: String,
  pub provider_id: String,
  pub email: Option<String>,
  pub tenant_id: crate::models::ids::TenantId,
}
