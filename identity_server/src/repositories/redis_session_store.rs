//! The Session Store (spec 4.C) over Redis. `delete_pattern` is bounded-batch
//! SCAN, never a blocking `KEYS` scan.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use identity_core::contracts::SessionStore;
use identity_core::error::CoreError;

pub struct RedisSessionStore {
  conn: ConnectionManager,
  scan_batch_size: u32,
}

impl RedisSessionStore {
  pub async fn connect(url: &str, scan_batch_size: u32) -> Result<Self, CoreError> {
    let client = redis::Client::open(url).map_err(|e| CoreError::Internal(e.to_string()))?;
    let conn = client
      .get_connection_manager()
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(Self {
      conn,
      scan_batch_size,
    })
  }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
  async fn set(&self, key: &str, value: &[u8], ttl_secs: i64) -> Result<(), CoreError> {
    let mut conn = self.conn.clone();
    conn
      .set_ex::<_, _, ()>(key, value, ttl_secs.max(1) as u64)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
    let mut conn = self.conn.clone();
    conn
      .get(key)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))
  }

  async fn delete(&self, key: &str) -> Result<(), CoreError> {
    let mut conn = self.conn.clone();
    let _: () = conn
      .del(key)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(())
  }

  async fn delete_pattern(&self, pattern: &str) -> Result<u64, CoreError> {
    let mut conn = self.conn.clone();
    let mut cursor: u64 = 0;
    let mut keys_to_delete: Vec<String> = Vec::new();

    loop {
      let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(self.scan_batch_size)
        .query_async(&mut conn)
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?;

      keys_to_delete.extend(batch);
      cursor = next_cursor;
      if cursor == 0 {
        break;
      }
    }

    if keys_to_delete.is_empty() {
      return Ok(0);
    }

    let deleted: u64 = conn
      .del(&keys_to_delete)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(deleted)
  }

  async fn ping(&self) -> Result<(), CoreError> {
    let mut conn = self.conn.clone();
    let _: String = redis::cmd("PING")
      .query_async(&mut conn)
      .await
      .map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(())
  }
}
