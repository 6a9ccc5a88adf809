//! Password policy evaluation (spec 4.A). Pure, store-free: given a plaintext
//! password and a tenant's policy, decide which rule (if any) it violates.

use crate::error::PasswordPolicyRule;
use crate::models::tenant::TenantLoginConfig;

/// Evaluate `password` against `config`. Returns the first violated rule, checked
/// in a fixed order: length, then the four character classes.
pub fn evaluate_password_policy(
  password: &str,
  config: &TenantLoginConfig,
) -> Result<(), PasswordPolicyRule> {
  if password.chars().count() < config.min_length {
    return Err(PasswordPolicyRule::MinLength);
  }
  if config.require_upper && !password.chars().any(|c| c.is_uppercase()) {
    return Err(PasswordPolicyRule::RequireUpper);
  }
  if config.require_lower && !password.chars().any(|c| c.is_lowercase()) {
    return Err(PasswordPolicyRule::RequireLower);
  }
  if config.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
    return Err(PasswordPolicyRule::RequireDigit);
  }
  if config.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
    return Err(PasswordPolicyRule::RequireSpecial);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::ids::TenantId;

  fn strict_config() -> TenantLoginConfig {
    let mut c = TenantLoginConfig::default_sentinel(TenantId("t1".into()));
    c.min_length = 8;
    c.require_upper = true;
    c.require_lower = true;
    c.require_digit = true;
    c.require_special = true;
    c
  }

  #[test]
  fn password_exactly_at_min_length_passes_other_rules_relaxed() {
    let mut c = TenantLoginConfig::default_sentinel(TenantId("t1".into()));
    c.min_length = 8;
    assert!(evaluate_password_policy("abcdefgh", &c).is_ok());
    assert_eq!(
      evaluate_password_policy("abcdefg", &c),
      Err(PasswordPolicyRule::MinLength)
    );
  }

  #[test]
  fn strict_policy_checks_every_class() {
    let c = strict_config();
    assert!(evaluate_password_policy("Abcdef1!", &c).is_ok());
    assert_eq!(
      evaluate_password_policy("abcdef1!", &c),
      Err(PasswordPolicyRule::RequireUpper)
    );
    assert_eq!(
      evaluate_password_policy("ABCDEF1!", &c),
      Err(PasswordPolicyRule::RequireLower)
    );
    assert_eq!(
      evaluate_password_policy("Abcdefg!", &c),
      Err(PasswordPolicyRule::RequireDigit)
    );
    assert_eq!(
      evaluate_password_policy("Abcdefg1", &c),
      Err(PasswordPolicyRule::RequireSpecial)
    );
  }
}
