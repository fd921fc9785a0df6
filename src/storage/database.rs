use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::{Migrations, M};
use tracing::info;

pub type DbPool = Pool<SqliteConnectionManager>;

/// 初始化数据库连接池并执行迁移
pub(crate) fn initialize_pool(db_path: &str, max_connections: u32) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path);

    let pool = Pool::builder()
        .max_size(max_connections.max(1))
        .connection_timeout(std::time::Duration::from_secs(5))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to initialize DB pool: {}", e))?;

    let mut conn = pool
        .get()
        .map_err(|e| anyhow::anyhow!("Failed to acquire init connection: {}", e))?;

    let migrations = Migrations::new(vec![
        // M1: 键值存储表（一个 key 对应一整段 JSON）
        M::up(
            "CREATE TABLE IF NOT EXISTS kv_store (
                storage_key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );",
        ),
    ]);

    if let Err(e) = migrations.to_latest(&mut conn) {
        return Err(anyhow::anyhow!("Failed to apply database migrations: {}", e));
    }

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    info!(
        "[Database] SQLite connection initialized at: {} (Pool size: {})",
        db_path,
        max_connections.max(1)
    );
    Ok(pool)
}
