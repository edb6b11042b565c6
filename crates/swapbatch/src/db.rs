use crate::{kv::KvStore, paths::SwapbatchPaths};
use async_trait::async_trait;
use eyre::Context as _;

// Embedded store (Turso, pure Rust) for the capability cache.
//
// Non-critical: callers treat read/write failures as cache misses.
pub struct Db {
    // Keep the database handle alive for the lifetime of the connection.
    _db: turso::Database,
    conn: turso::Connection,
}

// `turso::Database` / `turso::Connection` may not implement `Debug`.
impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl Db {
    pub async fn open(paths: &SwapbatchPaths) -> eyre::Result<Self> {
        crate::fsutil::ensure_private_dir(&paths.data_dir)?;
        let p = paths.cache_db_file();
        let p_s = p.to_string_lossy();

        let db = turso::Builder::new_local(p_s.as_ref())
            .build()
            .await
            .context("open turso local db")?;
        let conn = db.connect().context("connect turso db")?;

        let this = Self { _db: db, conn };
        this.init().await?;
        Ok(this)
    }

    async fn init(&self) -> eyre::Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS swapbatch_kv (\
                  key TEXT PRIMARY KEY,\
                  value TEXT NOT NULL,\
                  updated_at_ms INTEGER NOT NULL\
                )",
                (),
            )
            .await
            .context("create swapbatch_kv")?;
        Ok(())
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> eyre::Result<i64> {
    let d = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before unix epoch")?;
    i64::try_from(d.as_millis()).context("millis since unix epoch overflowed i64")
}

#[async_trait]
impl KvStore for Db {
    async fn get(&self, key: &str) -> eyre::Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM swapbatch_kv WHERE key = ?", (key,))
            .await
            .context("query swapbatch_kv")?;
        let Some(row) = rows.next().await.context("next row")? else {
            return Ok(None);
        };
        let value: String = row.get(0).context("row.value")?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> eyre::Result<()> {
        let now = now_ms()?;
        self.conn
            .execute(
                "INSERT INTO swapbatch_kv (key, value, updated_at_ms) VALUES (?, ?, ?) \
                 ON CONFLICT(key) DO UPDATE SET \
                   value=excluded.value, \
                   updated_at_ms=excluded.updated_at_ms",
                (key, value, now),
            )
            .await
            .context("upsert swapbatch_kv")?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> eyre::Result<()> {
        self.conn
            .execute("DELETE FROM swapbatch_kv WHERE key = ?", (key,))
            .await
            .context("delete swapbatch_kv")?;
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> eyre::Result<u64> {
        let len = i64::try_from(prefix.chars().count()).context("prefix length")?;
        let n = self
            .conn
            .execute(
                "DELETE FROM swapbatch_kv WHERE substr(key, 1, ?) = ?",
                (len, prefix),
            )
            .await
            .context("delete swapbatch_kv prefix")?;
        Ok(n)
    }
}
