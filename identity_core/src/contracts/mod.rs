pub mod credential_store;
pub mod permission_resolver;
pub mod session_store;

pub use credential_store::CredentialStore;
pub use permission_resolver::{PermissionCache, PermissionResolution, PermissionResolver};
pub use session_store::SessionStore;
