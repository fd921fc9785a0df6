use super::database::{self, DbPool};
use super::EventBackend;
use crate::common::events::Event;
use anyhow::Context;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

/// SQLite 键值后端
///
/// 语义上对应浏览器 localStorage：整段事件数组序列化后存放在固定的 storage key 下。
#[derive(Clone)]
pub struct SqliteBackend {
    pool: DbPool,
    storage_key: String,
}

impl SqliteBackend {
    pub fn new(db_path: &str, max_connections: u32, storage_key: &str) -> anyhow::Result<Self> {
        let pool = database::initialize_pool(db_path, max_connections)?;
        Ok(Self {
            pool,
            storage_key: storage_key.to_string(),
        })
    }

    pub fn get_conn(&self) -> anyhow::Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("DB Connection failed: {}", e))
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

impl EventBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self) -> anyhow::Result<Vec<Event>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_store WHERE storage_key = ?1",
                params![self.storage_key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing stored value for key '{}'", self.storage_key)),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, events: &[Event]) -> anyhow::Result<()> {
        let value = serde_json::to_string(events)?;
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO kv_store (storage_key, value, updated_at)
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
             ON CONFLICT(storage_key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![self.storage_key, value],
        )?;
        Ok(())
    }
}
