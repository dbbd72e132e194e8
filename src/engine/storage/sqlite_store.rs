use anyhow::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OpenFlags};
use r2d2_sqlite::SqliteConnectionManager;

use crate::engine::storage::area::StorageArea;

/// SQLite-backed storage area. Several areas can share one database file as long as
/// they use different namespaces.
pub struct SqliteStorageArea {
    pool: Pool<SqliteConnectionManager>,
    namespace: String,
}

impl SqliteStorageArea {
    /// Opens (or creates) the database at `path` and binds the area to `namespace`.
    pub fn open(path: &str, namespace: impl Into<String>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE |
                    OpenFlags::SQLITE_OPEN_CREATE |
                    OpenFlags::SQLITE_OPEN_URI
            )
            .with_init(|c| {
                c.busy_timeout(std::time::Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS panel_storage (
                        namespace TEXT NOT NULL,
                        key TEXT NOT NULL,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
                        PRIMARY KEY(namespace, key)
                    );"
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(manager)?;

        Ok(Self { pool, namespace: namespace.into() })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl StorageArea for SqliteStorageArea {
    fn get_item(&self, key: &str) -> Option<String> {
        let conn = self.conn().ok()?;
        conn.query_row(
            "SELECT value FROM panel_storage WHERE namespace=?1 AND key=?2",
            params![self.namespace, key],
            |row| row.get::<_, String>(0),
        ).ok()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO panel_storage(namespace,key,value) VALUES (?1,?2,?3)
             ON CONFLICT(namespace,key) DO UPDATE
             SET value=excluded.value, updated_at=strftime('%s','now')",
            params![self.namespace, key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM panel_storage WHERE namespace=?1 AND key=?2",
            params![self.namespace, key],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM panel_storage WHERE namespace=?1",
            params![self.namespace],
        )?;
        Ok(())
    }

    fn len(&self) -> usize {
        let conn = match self.conn() { Ok(c) => c, Err(_) => return 0 };
        conn.query_row::<u32, _, _>(
            "SELECT COUNT(*) FROM panel_storage WHERE namespace=?1",
            params![self.namespace],
            |row| row.get(0),
        ).unwrap_or(0) as usize
    }

    fn keys(&self) -> Vec<String> {
        let conn = match self.conn() { Ok(c) => c, Err(_) => return vec![] };
        let mut stmt = match conn.prepare(
            "SELECT key FROM panel_storage WHERE namespace=?1 ORDER BY key",
        ) { Ok(s) => s, Err(_) => return vec![] };

        let rows = match stmt.query_map(params![self.namespace], |row| row.get::<_, String>(0)) {
            Ok(r) => r,
            Err(_) => return vec![],
        };

        rows.filter_map(|r| r.ok()).collect()
    }
}
