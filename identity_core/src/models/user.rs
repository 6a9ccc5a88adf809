use argon2::{
  Argon2, PasswordHash, PasswordVerifier,
  password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::models::ids::UserId;

/// A registered principal. At least one identifier field is non-empty at creation
/// (spec 3: "User" invariant); each non-empty identifier is unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
  pub id: UserId,
  pub email: Option<String>,
  pub username: Option<String>,
  pub phone: Option<String>,
  pub doc_number: Option<String>,
  /// Never serialized on API-bound reads; the Credential Store MUST project this
  /// field only on the authentication read path (spec 4.B: "projection discipline").
  #[serde(skip)]
  pub password_hash: String,
  pub is_active: bool,
  pub is_verified: bool,
  pub last_login_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The identifier dimension a login attempt was recognized under. Modeled as a sum
/// type per spec section 9 ("Dynamic identifier detection"): the login path treats
/// it uniformly once detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
  Email,
  Username,
  Phone,
  DocNumber,
}

impl IdentifierKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      IdentifierKind::Email => "email",
      IdentifierKind::Username => "username",
      IdentifierKind::Phone => "phone",
      IdentifierKind::DocNumber => "doc_number",
    }
  }
}

/// Detect which identifier field of `user` the submitted `identifier` matches, by
/// exact equality, checked in the fixed order email, username, phone, doc_number
/// (spec 4.A). Returns `None` if it matches none of them; callers MUST treat that
/// the same as a failed login without revealing which field mismatched.
pub fn detect_identifier_kind(identifier: &str, user: &User) -> Option<IdentifierKind> {
  if user.email.as_deref() == Some(identifier) {
    return Some(IdentifierKind::Email);
  }
  if user.username.as_deref() == Some(identifier) {
    return Some(IdentifierKind::Username);
  }
  if user.phone.as_deref() == Some(identifier) {
    return Some(IdentifierKind::Phone);
  }
  if user.doc_number.as_deref() == Some(identifier) {
    return Some(IdentifierKind::DocNumber);
  }
  None
}

/// Inputs for `CredentialStore::create_user` / registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewUser {
  pub email: Option<String>,
  pub username: Option<String>,
  pub phone: Option<String>,
  pub doc_number: Option<String>,
  pub password: String,
}

impl NewUser {
  /// At least one identifier field must be non-empty at creation (spec 3).
  pub fn has_identifier(&self) -> bool {
    self.email.as_deref().is_some_and(|s| !s.is_empty())
      || self.username.as_deref().is_some_and(|s| !s.is_empty())
      || self.phone.as_deref().is_some_and(|s| !s.is_empty())
      || self.doc_number.as_deref().is_some_and(|s| !s.is_empty())
  }
}

/// Hash a plaintext password with Argon2id, a salted adaptive one-way function
/// (spec 4.A).
pub fn hashed_password(password: &str) -> Result<String, CoreError> {
  let salt = SaltString::generate(OsRng);
  let argon2 = Argon2::default();
  let password_hash = argon2
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| CoreError::Internal(e.to_string()))?
    .to_string();
  Ok(password_hash)
}

/// Constant-time password verification against a PHC-formatted hash (spec 4.A:
/// "Comparison MUST be constant-time" — guaranteed by `argon2`'s `verify_password`).
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, CoreError> {
  let argon2 = Argon2::default();
  let parsed_hash =
    PasswordHash::new(password_hash).map_err(|e| CoreError::Internal(e.to_string()))?;
  Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashed_password_round_trips() {
    let password = "hunter4332";
    let password_hash = hashed_password(password).unwrap();
    assert_eq!(password_hash.len(), 97);
    assert!(verify_password(password, &password_hash).unwrap());
    assert!(!verify_password("wrong", &password_hash).unwrap());
  }

  #[test]
  fn detect_identifier_kind_checks_email_before_username() {
    let user = User {
      id: UserId("u1".into()),
      email: Some("a@b.c".into()),
      username: Some("a@b.c".into()),
      phone: None,
      doc_number: None,
      password_hash: String::new(),
      is_active: true,
      is_verified: true,
      last_login_at: None,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    assert_eq!(
      detect_identifier_kind("a@b.c", &user),
      Some(IdentifierKind::Email)
    );
  }

  #[test]
  fn detect_identifier_kind_returns_none_on_no_match() {
    let user = User {
      id: UserId("u1".into()),
      email: Some("a@b.c".into()),
      username: None,
      phone: None,
      doc_number: None,
      password_hash: String::new(),
      is_active: true,
      is_verified: true,
      last_login_at: None,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    assert_eq!(detect_identifier_kind("nope", &user), None);
  }
}
