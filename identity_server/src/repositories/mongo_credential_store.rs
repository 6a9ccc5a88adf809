//! The production `CredentialStore` (spec 4.B) over `mongodb::Client`. Collections
//! map 1:1 to spec.md §6's persisted-state layout, one typed collection per
//! aggregate, since this engine's configuration surface (spec.md §6,
//! `MONGODB_URI`/`MONGODB_DATABASE`) names MongoDB as the store of record.

use bson::{doc, oid::ObjectId};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use identity_core::contracts::CredentialStore;
use identity_core::error::CoreError;
use identity_core::models::ids::{RoleId, TenantId, UserId};
use identity_core::models::lockout::UserLockout;
use identity_core::models::login_attempt::LoginAttempt;
use identity_core::models::oauth_account::OAuthAccount;
use identity_core::models::refresh_credential::RefreshCredential;
use identity_core::models::role::Role;
use identity_core::models::tenant::{TenantBranding, TenantLoginConfig, UserTenantMembership};
use identity_core::models::user::{IdentifierKind, NewUser, User};

const USERS_COLLECTION: &str = "users_auth";
const MEMBERSHIPS_COLLECTION: &str = "user_tenants";
const ROLES_COLLECTION: &str = "roles";
const TENANT_CONFIGS_COLLECTION: &str = "tenant_login_configs";
const REFRESH_TOKENS_COLLECTION: &str = "refresh_tokens";
const LOGIN_ATTEMPTS_COLLECTION: &str = "login_attempts";
const LOCKOUTS_COLLECTION: &str = "user_lockouts";
const OAUTH_ACCOUNTS_COLLECTION: &str = "oauth_accounts";

/// Recognize a Mongo duplicate-key write error (code 11000) as `conflict`; every
/// other storage error is `internal` (spec 7 has no storage-detail taxonomy value).
fn map_mongo_err(err: mongodb::error::Error) -> CoreError {
  use mongodb::error::{ErrorKind, WriteFailure};
  if let ErrorKind::Write(WriteFailure::WriteError(we)) = err.kind.as_ref() {
    if we.code == 11000 {
      return CoreError::Conflict("duplicate identifier".to_string());
    }
  }
  CoreError::Internal(err.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  email: Option<String>,
  username: Option<String>,
  phone: Option<String>,
  doc_number: Option<String>,
  password_hash: String,
  is_active: bool,
  is_verified: bool,
  last_login_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<UserDoc> for User {
  fn from(doc: UserDoc) -> Self {
    User {
      id: UserId(doc.id.expect("persisted user always has an _id").to_hex()),
      email: doc.email,
      username: doc.username,
      phone: doc.phone,
      doc_number: doc.doc_number,
      password_hash: doc.password_hash,
      is_active: doc.is_active,
      is_verified: doc.is_verified,
      last_login_at: doc.last_login_at,
      created_at: doc.created_at,
      updated_at: doc.updated_at,
    }
  }
}

fn parse_object_id(id: &UserId) -> Result<ObjectId, CoreError> {
  ObjectId::parse_str(&id.0).map_err(|_| CoreError::Unauthenticated)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MembershipDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  user_id: String,
  tenant_id: String,
  roles: Vec<String>,
  is_active: bool,
  joined_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<MembershipDoc> for UserTenantMembership {
  fn from(doc: MembershipDoc) -> Self {
    UserTenantMembership {
      user_id: UserId(doc.user_id),
      tenant_id: TenantId(doc.tenant_id),
      roles: doc.roles,
      is_active: doc.is_active,
      joined_at: doc.joined_at,
      updated_at: doc.updated_at,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  name: String,
  tenant_id: Option<String>,
  permissions: Vec<String>,
  is_system: bool,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<RoleDoc> for Role {
  fn from(doc: RoleDoc) -> Self {
    Role {
      id: RoleId(doc.id.expect("persisted role always has an _id").to_hex()),
      name: doc.name,
      tenant_id: doc.tenant_id.map(TenantId),
      permissions: doc.permissions,
      is_system: doc.is_system,
      created_at: doc.created_at,
      updated_at: doc.updated_at,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TenantBrandingDoc {
  display_name: Option<String>,
  logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TenantLoginConfigDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  tenant_id: String,
  allowed_identifiers: Vec<String>,
  require_2fa: bool,
  allow_registration: bool,
  min_length: i64,
  require_upper: bool,
  require_lower: bool,
  require_digit: bool,
  require_special: bool,
  session_timeout_minutes: i64,
  max_login_attempts: i64,
  lockout_duration_minutes: i64,
  branding: Option<TenantBrandingDoc>,
}

fn identifier_kind_to_str(kind: &IdentifierKind) -> &'static str {
  kind.as_str()
}

fn identifier_kind_from_str(s: &str) -> Option<IdentifierKind> {
  match s {
    "email" => Some(IdentifierKind::Email),
    "username" => Some(IdentifierKind::Username),
    "phone" => Some(IdentifierKind::Phone),
    "doc_number" => Some(IdentifierKind::DocNumber),
    _ => None,
  }
}

impl From<TenantLoginConfigDoc> for TenantLoginConfig {
  fn from(doc: TenantLoginConfigDoc) -> Self {
    TenantLoginConfig {
      tenant_id: TenantId(doc.tenant_id),
      allowed_identifiers: doc
        .allowed_identifiers
        .iter()
        .filter_map(|s| identifier_kind_from_str(s))
        .collect(),
      require_2fa: doc.require_2fa,
      allow_registration: doc.allow_registration,
      min_length: doc.min_length.max(0) as usize,
      require_upper: doc.require_upper,
      require_lower: doc.require_lower,
      require_digit: doc.require_digit,
      require_special: doc.require_special,
      session_timeout_minutes: doc.session_timeout_minutes,
      max_login_attempts: doc.max_login_attempts.max(0) as u32,
      lockout_duration_minutes: doc.lockout_duration_minutes,
      branding: doc.branding.map(|b| TenantBranding {
        display_name: b.display_name,
        logo_url: b.logo_url,
      }),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefreshCredentialDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  user_id: String,
  tenant_id: String,
  token: String,
  expires_at: DateTime<Utc>,
  created_at: DateTime<Utc>,
  revoked_at: Option<DateTime<Utc>>,
}

impl From<RefreshCredentialDoc> for RefreshCredential {
  fn from(doc: RefreshCredentialDoc) -> Self {
    RefreshCredential {
      user_id: UserId(doc.user_id),
      tenant_id: TenantId(doc.tenant_id),
      token: doc.token,
      expires_at: doc.expires_at,
      created_at: doc.created_at,
      revoked_at: doc.revoked_at,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoginAttemptDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  identifier: String,
  tenant_id: String,
  ip: Option<String>,
  success: bool,
  timestamp: DateTime<Utc>,
}

impl From<LoginAttemptDoc> for LoginAttempt {
  fn from(doc: LoginAttemptDoc) -> Self {
    LoginAttempt {
      identifier: doc.identifier,
      tenant_id: TenantId(doc.tenant_id),
      ip: doc.ip,
      success: doc.success,
      timestamp: doc.timestamp,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserLockoutDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  user_id: String,
  tenant_id: String,
  locked_at: DateTime<Utc>,
  unlock_at: DateTime<Utc>,
  reason: String,
  is_active: bool,
}

impl From<UserLockoutDoc> for UserLockout {
  fn from(doc: UserLockoutDoc) -> Self {
    UserLockout {
      user_id: UserId(doc.user_id),
      tenant_id: TenantId(doc.tenant_id),
      locked_at: doc.locked_at,
      unlock_at: doc.unlock_at,
      reason: doc.reason,
      is_active: doc.is_active,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OAuthAccountDoc {
  #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
  id: Option<ObjectId>,
  user_id: String,
  provider: String,
  provider_id: String,
  email: Option<String>,
}

impl From<OAuthAccountDoc> for OAuthAccount {
  fn from(doc: OAuthAccountDoc) -> Self {
    OAuthAccount {
      user_id: UserId(doc.user_id),
      provider: doc.provider,
      provider_id: doc.provider_id,
      email: doc.email,
    }
  }
}

pub struct MongoCredentialStore {
  db: Database,
  users: Collection<UserDoc>,
  memberships: Collection<MembershipDoc>,
  roles: Collection<RoleDoc>,
  tenant_configs: Collection<TenantLoginConfigDoc>,
  refresh_tokens: Collection<RefreshCredentialDoc>,
  login_attempts: Collection<LoginAttemptDoc>,
  lockouts: Collection<UserLockoutDoc>,
  oauth_accounts: Collection<OAuthAccountDoc>,
}

impl MongoCredentialStore {
  pub async fn connect(uri: &str, database: &str) -> Result<Self, CoreError> {
    let client = Client::with_uri_str(uri)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    let db = client.database(database);
    Ok(Self {
      users: db.collection(USERS_COLLECTION),
      memberships: db.collection(MEMBERSHIPS_COLLECTION),
      roles: db.collection(ROLES_COLLECTION),
      tenant_configs: db.collection(TENANT_CONFIGS_COLLECTION),
      refresh_tokens: db.collection(REFRESH_TOKENS_COLLECTION),
      login_attempts: db.collection(LOGIN_ATTEMPTS_COLLECTION),
      lockouts: db.collection(LOCKOUTS_COLLECTION),
      oauth_accounts: db.collection(OAUTH_ACCOUNTS_COLLECTION),
      db,
    })
  }
}

#[async_trait::async_trait]
impl CredentialStore for MongoCredentialStore {
  async fn create_user(&self, user: &NewUser) -> Result<User, CoreError> {
    let now = Utc::now();
    let doc = UserDoc {
      id: None,
      email: non_empty(&user.email),
      username: non_empty(&user.username),
      phone: non_empty(&user.phone),
      doc_number: non_empty(&user.doc_number),
      password_hash: user.password.clone(),
      is_active: true,
      is_verified: false,
      last_login_at: None,
      created_at: now,
      updated_at: now,
    };
    let result = self.users.insert_one(&doc).await.map_err(map_mongo_err)?;
    let id = result
      .inserted_id
      .as_object_id()
      .ok_or_else(|| CoreError::Internal("mongo did not return an ObjectId".to_string()))?;
    Ok(User::from(UserDoc {
      id: Some(id),
      ..doc
    }))
  }

  async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, CoreError> {
    let filter = doc! {
      "$or": [
        {"email": identifier},
        {"username": identifier},
        {"phone": identifier},
        {"doc_number": identifier},
      ]
    };
    let found = self.users.find_one(filter).await.map_err(map_mongo_err)?;
    Ok(found.map(User::from))
  }

  async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, CoreError> {
    let oid = parse_object_id(id)?;
    let found = self
      .users
      .find_one(doc! {"_id": oid})
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(User::from))
  }

  async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), CoreError> {
    let oid = parse_object_id(id)?;
    self
      .users
      .update_one(
        doc! {"_id": oid},
        doc! {"$set": {"last_login_at": at, "updated_at": at}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn set_user_active(&self, id: &UserId, is_active: bool) -> Result<(), CoreError> {
    let oid = parse_object_id(id)?;
    self
      .users
      .update_one(
        doc! {"_id": oid},
        doc! {"$set": {"is_active": is_active, "updated_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn add_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<UserTenantMembership, CoreError> {
    let now = Utc::now();
    let filter = doc! {"user_id": &user_id.0, "tenant_id": &tenant_id.0};
    let update = doc! {
      "$set": {"roles": &roles, "is_active": true, "updated_at": now},
      "$setOnInsert": {"joined_at": now},
    };
    self
      .memberships
      .update_one(filter.clone(), update)
      .with_options(UpdateOptions::builder().upsert(true).build())
      .await
      .map_err(map_mongo_err)?;

    let doc = self
      .memberships
      .find_one(filter)
      .await
      .map_err(map_mongo_err)?
      .ok_or_else(|| CoreError::Internal("membership upsert did not persist".to_string()))?;
    Ok(doc.into())
  }

  async fn find_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserTenantMembership>, CoreError> {
    let found = self
      .memberships
      .find_one(doc! {"user_id": &user_id.0, "tenant_id": &tenant_id.0})
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(Into::into))
  }

  async fn deactivate_membership(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<(), CoreError> {
    self
      .memberships
      .update_one(
        doc! {"user_id": &user_id.0, "tenant_id": &tenant_id.0},
        doc! {"$set": {"is_active": false, "updated_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn update_membership_roles(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    roles: Vec<String>,
  ) -> Result<(), CoreError> {
    self
      .memberships
      .update_one(
        doc! {"user_id": &user_id.0, "tenant_id": &tenant_id.0},
        doc! {"$set": {"roles": roles, "updated_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn find_roles_by_names(
    &self,
    names: &[String],
    tenant_id: &TenantId,
  ) -> Result<Vec<Role>, CoreError> {
    let filter = doc! {
      "name": {"$in": names},
      "$or": [
        {"tenant_id": &tenant_id.0},
        {"tenant_id": bson::Bson::Null},
      ]
    };
    let cursor = self.roles.find(filter).await.map_err(map_mongo_err)?;
    let docs: Vec<RoleDoc> = cursor.try_collect().await.map_err(map_mongo_err)?;
    Ok(docs.into_iter().map(Into::into).collect())
  }

  async fn find_role_by_id(&self, id: &RoleId) -> Result<Option<Role>, CoreError> {
    let oid = ObjectId::parse_str(&id.0).map_err(|_| CoreError::NotFound("role".to_string()))?;
    let found = self
      .roles
      .find_one(doc! {"_id": oid})
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(Into::into))
  }

  async fn create_refresh_credential(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
    token: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<RefreshCredential, CoreError> {
    let doc = RefreshCredentialDoc {
      id: None,
      user_id: user_id.0.clone(),
      tenant_id: tenant_id.0.clone(),
      token: token.to_string(),
      expires_at,
      created_at: Utc::now(),
      revoked_at: None,
    };
    self
      .refresh_tokens
      .insert_one(&doc)
      .await
      .map_err(map_mongo_err)?;
    Ok(doc.into())
  }

  async fn find_valid_refresh_credential(
    &self,
    token: &str,
  ) -> Result<Option<RefreshCredential>, CoreError> {
    let filter = doc! {
      "token": token,
      "revoked_at": bson::Bson::Null,
      "expires_at": {"$gt": Utc::now()},
    };
    let found = self
      .refresh_tokens
      .find_one(filter)
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(Into::into))
  }

  async fn revoke_refresh_credential(&self, token: &str) -> Result<(), CoreError> {
    self
      .refresh_tokens
      .update_one(
        doc! {"token": token},
        doc! {"$set": {"revoked_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<(), CoreError> {
    self
      .refresh_tokens
      .update_many(
        doc! {"user_id": &user_id.0, "revoked_at": bson::Bson::Null},
        doc! {"$set": {"revoked_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn revoke_for_tenant(&self, user_id: &UserId, tenant_id: &TenantId) -> Result<(), CoreError> {
    self
      .refresh_tokens
      .update_many(
        doc! {"user_id": &user_id.0, "tenant_id": &tenant_id.0, "revoked_at": bson::Bson::Null},
        doc! {"$set": {"revoked_at": Utc::now()}},
      )
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn count_active_for_user(&self, user_id: &UserId) -> Result<u64, CoreError> {
    let filter = doc! {
      "user_id": &user_id.0,
      "revoked_at": bson::Bson::Null,
      "expires_at": {"$gt": Utc::now()},
    };
    self
      .refresh_tokens
      .count_documents(filter)
      .await
      .map_err(map_mongo_err)
  }

  async fn record_login_attempt(&self, attempt: LoginAttempt) -> Result<(), CoreError> {
    let doc = LoginAttemptDoc {
      id: None,
      identifier: attempt.identifier,
      tenant_id: attempt.tenant_id.0,
      ip: attempt.ip,
      success: attempt.success,
      timestamp: attempt.timestamp,
    };
    self
      .login_attempts
      .insert_one(&doc)
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  async fn find_recent_attempts(
    &self,
    identifier: &str,
    tenant_id: &TenantId,
    since: DateTime<Utc>,
  ) -> Result<Vec<LoginAttempt>, CoreError> {
    let filter = doc! {
      "identifier": identifier,
      "tenant_id": &tenant_id.0,
      "timestamp": {"$gte": since},
    };
    let cursor = self
      .login_attempts
      .find(filter)
      .await
      .map_err(map_mongo_err)?;
    let docs: Vec<LoginAttemptDoc> = cursor.try_collect().await.map_err(map_mongo_err)?;
    Ok(docs.into_iter().map(Into::into).collect())
  }

  async fn create_lockout(&self, lockout: UserLockout) -> Result<(), CoreError> {
    let doc = UserLockoutDoc {
      id: None,
      user_id: lockout.user_id.0,
      tenant_id: lockout.tenant_id.0,
      locked_at: lockout.locked_at,
      unlock_at: lockout.unlock_at,
      reason: lockout.reason,
      is_active: lockout.is_active,
    };
    self.lockouts.insert_one(&doc).await.map_err(map_mongo_err)?;
    Ok(())
  }

  async fn find_active_lockout(
    &self,
    user_id: &UserId,
    tenant_id: &TenantId,
  ) -> Result<Option<UserLockout>, CoreError> {
    let filter = doc! {
      "user_id": &user_id.0,
      "tenant_id": &tenant_id.0,
      "is_active": true,
    };
    let found = self
      .lockouts
      .find_one(filter)
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(Into::into))
  }

  async fn get_tenant_login_config(
    &self,
    tenant_id: &TenantId,
  ) -> Result<TenantLoginConfig, CoreError> {
    let found = self
      .tenant_configs
      .find_one(doc! {"tenant_id": &tenant_id.0})
      .await
      .map_err(map_mongo_err)?;
    Ok(
      found
        .map(Into::into)
        .unwrap_or_else(|| TenantLoginConfig::default_sentinel(tenant_id.clone())),
    )
  }

  async fn find_oauth_account(
    &self,
    provider: &str,
    provider_id: &str,
  ) -> Result<Option<OAuthAccount>, CoreError> {
    let found = self
      .oauth_accounts
      .find_one(doc! {"provider": provider, "provider_id": provider_id})
      .await
      .map_err(map_mongo_err)?;
    Ok(found.map(Into::into))
  }

  async fn link_oauth_account(&self, account: OAuthAccount) -> Result<(), CoreError> {
    let doc = OAuthAccountDoc {
      id: None,
      user_id: account.user_id.0,
      provider: account.provider,
      provider_id: account.provider_id,
      email: account.email,
    };
    self
      .oauth_accounts
      .insert_one(&doc)
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }

  /// Declares every unique/TTL index of spec 4.B. Idempotent: `create_index` is a
  /// no-op when an identical index already exists.
  async fn ensure_indexes(&self) -> Result<(), CoreError> {
    let unique_sparse = |field: &str| {
      IndexModel::builder()
        .keys(doc! {field: 1})
        .options(
          IndexOptions::builder()
            .unique(true)
            .sparse(true)
            .build(),
        )
        .build()
    };

    for field in ["email", "username", "phone", "doc_number"] {
      self
        .users
        .create_index(unique_sparse(field))
        .await
        .map_err(map_mongo_err)?;
    }

    self
      .memberships
      .create_index(
        IndexModel::builder()
          .keys(doc! {"user_id": 1, "tenant_id": 1})
          .options(IndexOptions::builder().unique(true).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    self
      .roles
      .create_index(
        IndexModel::builder()
          .keys(doc! {"name": 1, "tenant_id": 1})
          .options(IndexOptions::builder().unique(true).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    self
      .tenant_configs
      .create_index(
        IndexModel::builder()
          .keys(doc! {"tenant_id": 1})
          .options(IndexOptions::builder().unique(true).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    self
      .refresh_tokens
      .create_index(
        IndexModel::builder()
          .keys(doc! {"token": 1})
          .options(IndexOptions::builder().unique(true).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;
    self
      .refresh_tokens
      .create_index(
        IndexModel::builder()
          .keys(doc! {"expires_at": 1})
          .options(IndexOptions::builder().expire_after(std::time::Duration::from_secs(0)).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    self
      .login_attempts
      .create_index(
        IndexModel::builder()
          .keys(doc! {"timestamp": 1})
          .options(
            IndexOptions::builder()
              .expire_after(std::time::Duration::from_secs(24 * 60 * 60))
              .build(),
          )
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    self
      .oauth_accounts
      .create_index(
        IndexModel::builder()
          .keys(doc! {"provider": 1, "provider_id": 1})
          .options(IndexOptions::builder().unique(true).build())
          .build(),
      )
      .await
      .map_err(map_mongo_err)?;

    Ok(())
  }

  async fn ping(&self) -> Result<(), CoreError> {
    self
      .db
      .run_command(doc! {"ping": 1})
      .await
      .map_err(map_mongo_err)?;
    Ok(())
  }
}

fn non_empty(value: &Option<String>) -> Option<String> {
  value.clone().filter(|s| !s.is_empty())
}
