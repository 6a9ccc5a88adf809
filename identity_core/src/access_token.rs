//! The opaque access token (spec 4.F, glossary "Opaque access token"): a
//! cryptographically random, URL-safe string whose only meaning is the Session Store
//! entry stored against it. Generation follows the same CSPRNG-then-encode shape the
//! teacher uses for refresh-token generation, widened from hex to base64url so the
//! required ≥32 bytes of entropy is carried in a shorter string.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes backing each access token (spec: "≥32 bytes of entropy").
pub const ACCESS_TOKEN_ENTROPY_BYTES: usize = 32;

pub fn generate_access_token() -> String {
  let mut bytes = [0u8; ACCESS_TOKEN_ENTROPY_BYTES];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generates_unique_sufficiently_long_tokens() {
    let a = generate_access_token();
    let b = generate_access_token();
    assert_ne!(a, b);
    assert!(a.len() >= 43); // 32 bytes base64url-no-pad encodes to 43 chars
  }
}
