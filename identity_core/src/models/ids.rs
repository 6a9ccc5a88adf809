//! Newtype wrappers for the identifiers that flow across the engine.
//!
//! `UserId` wraps the storage-level id assigned by the Credential Store (a Mongo
//! `ObjectId` rendered as its 24-char hex string). `TenantId` wraps the externally
//! assigned tenant identifier (spec: "tenant id (primary key, externally assigned)")
//! and is therefore a plain string, not derived from any document id.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TenantId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl fmt::Display for TenantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl fmt::Display for RoleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for UserId {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl From<String> for TenantId {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl AsRef<str> for UserId {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl AsRef<str> for TenantId {
  fn as_ref(&self) -> &str {
    &self.0
  }
}
