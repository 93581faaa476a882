//! Opaque string-keyed byte store with optional TTL and prefix scan (spec.md §4.A).
//!
//! Grounded on the teacher's `SqliteStore`: a single rusqlite connection wrapped in
//! `Arc<Mutex<Connection>>`, with blocking calls bridged into async via
//! `tokio::task::block_in_place`. Unlike the teacher's generic namespace/key/value table this
//! store is single-namespace (the facade layer encodes its own namespacing into the key
//! string via [`crate::keys`]), since nothing above this layer needs a second dimension.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

/// Maximum rows returned by a single [`KvStore::scan_prefix`] call (spec.md §4.A
/// "prefix-scan up to 1000 keys").
pub const SCAN_PREFIX_LIMIT: usize = 1000;

#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Returns up to [`SCAN_PREFIX_LIMIT`] `(key, value)` pairs whose key starts with `prefix`,
    /// ordered by key. Expired rows are skipped, not returned.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// rusqlite-backed [`KvStore`]. TTL expiry is lazy: an expired row is skipped by readers and
/// physically deleted the next time it is touched by `get` or a `scan_prefix` that crosses it,
/// rather than by a background sweep.
pub struct SqliteKv {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKv {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Storage(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Storage(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER
             );
             CREATE INDEX IF NOT EXISTS kv_key_prefix ON kv(key);",
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }

    fn now_secs() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::block_in_place(move || {
            let conn = conn.lock().expect("kv lock poisoned");
            let row: Option<(Vec<u8>, Option<i64>)> = conn
                .query_row(
                    "SELECT value, expires_at FROM kv WHERE key = ?1",
                    params![key],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            match row {
                None => Ok(None),
                Some((value, Some(expires_at))) if expires_at <= Self::now_secs() => {
                    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                        .map_err(|e| StoreError::Storage(e.to_string()))?;
                    let _ = value;
                    Ok(None)
                }
                Some((value, _)) => Ok(Some(value)),
            }
        })
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let expires_at = ttl_secs.map(|secs| Self::now_secs() + secs as i64);
        tokio::task::block_in_place(move || {
            let conn = conn.lock().expect("kv lock poisoned");
            conn.execute(
                "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(())
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::block_in_place(move || {
            let conn = conn.lock().expect("kv lock poisoned");
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(())
        })
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let conn = self.conn.clone();
        let prefix = prefix.to_string();
        tokio::task::block_in_place(move || {
            let conn = conn.lock().expect("kv lock poisoned");
            // LIKE escapes are unnecessary: keys are built from our own fixed key-scheme
            // segments and ids (uuids, numeric ids), never free-form user text.
            let upper = format!("{prefix}\u{10FFFF}");
            let mut stmt = conn
                .prepare(
                    "SELECT key, value, expires_at FROM kv
                     WHERE key >= ?1 AND key < ?2
                     ORDER BY key
                     LIMIT ?3",
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            let now = Self::now_secs();
            let rows = stmt
                .query_map(
                    params![prefix, upper, SCAN_PREFIX_LIMIT as i64],
                    |r| {
                        let key: String = r.get(0)?;
                        let value: Vec<u8> = r.get(1)?;
                        let expires_at: Option<i64> = r.get(2)?;
                        Ok((key, value, expires_at))
                    },
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            let mut out = Vec::new();
            let mut expired = Vec::new();
            for row in rows {
                let (key, value, expires_at) = row.map_err(|e| StoreError::Storage(e.to_string()))?;
                if expires_at.is_some_and(|e| e <= now) {
                    expired.push(key);
                    continue;
                }
                out.push((key, value));
            }
            for key in expired {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                    .map_err(|e| StoreError::Storage(e.to_string()))?;
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("a", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let kv = SqliteKv::open_in_memory().unwrap();
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("a", b"1".to_vec(), None).await.unwrap();
        kv.delete("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_ttl_is_not_returned() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("a", b"1".to_vec(), Some(0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_prefix_orders_and_limits() {
        let kv = SqliteKv::open_in_memory().unwrap();
        for i in 0..5 {
            kv.set(&format!("p:{i}"), vec![i as u8], None).await.unwrap();
        }
        kv.set("q:0", vec![9], None).await.unwrap();
        let rows = kv.scan_prefix("p:").await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].0, "p:0");
        assert_eq!(rows[4].0, "p:4");
    }

    #[tokio::test]
    async fn scan_prefix_skips_expired_rows() {
        let kv = SqliteKv::open_in_memory().unwrap();
        kv.set("p:0", vec![0], Some(0)).await.unwrap();
        kv.set("p:1", vec![1], None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let rows = kv.scan_prefix("p:").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "p:1");
    }
}
