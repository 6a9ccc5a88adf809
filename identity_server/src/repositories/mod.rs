//! Production stores backing the `CredentialStore`/`SessionStore`/`PermissionResolver`
//! contracts of `identity_core`.

pub mod mongo_credential_store;
pub mod permission_cache;
pub mod redis_session_store;

pub use mongo_credential_store::MongoCredentialStore;
pub use permission_cache::{DashMapPermissionCache, RedisPermissionCache, TwoLevelPermissionResolver};
pub use redis_session_store::RedisSessionStore;
