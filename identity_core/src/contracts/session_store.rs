//! The Session Store contract (spec 4.C): a short-TTL key→blob store with atomic
//! get/set/delete and bounded pattern-scoped deletion.

use async_trait::async_trait;

use crate::error::CoreError;

#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn set(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<(), CoreError>;
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
  async fn delete(&self, key: &str) -> Result<(), CoreError>;

  /// MUST iterate in bounded batches — never a single blocking scan of the full
  /// keyspace (spec 4.C), so that logging out a user with many sessions does not
  /// stall other clients sharing the store.
  async fn delete_pattern(&self, pattern: &str) -> Result<u64, CoreError>;

  /// Store-level liveness check for `/ready` (spec 6).
  async fn ping(&self) -> Result<(), CoreError>;
}
