use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::params;

use super::migrations::ensure_state_table;
use super::models::StateRecord;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Key-value store of the last known state, keyed by site name
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the record for a site, `None` if the site was never recorded
    async fn get(&self, site_name: &str) -> Result<Option<StateRecord>>;

    /// Insert or replace the record for `record.site_name`
    async fn put(&self, record: &StateRecord) -> Result<()>;
}

/// LibSQL backed state store
pub struct LibsqlStateStore {
    pool: LibsqlPool,
    table: String,
}

impl LibsqlStateStore {
    /// Create a store over `table`, which must be a plain identifier
    pub fn new_from_pool(pool: LibsqlPool, table: impl Into<String>) -> Self {
        Self { pool, table: table.into() }
    }

    /// Make sure the backing table exists
    pub async fn initialize(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        ensure_state_table(&conn, &self.table).await
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl StateStore for LibsqlStateStore {
    async fn get(&self, site_name: &str) -> Result<Option<StateRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT site_name, exceptional, last_checked, last_message \
                     FROM {} WHERE site_name = ?",
                    self.table
                ),
                params![site_name.to_string()],
            )
            .await
            .with_context(|| format!("reading state for {}", site_name))?;

        if let Some(row) = rows.next().await? {
            let last_checked: i64 = row.get(2)?;

            Ok(Some(StateRecord {
                site_name: row.get(0)?,
                exceptional: row.get::<i64>(1)? != 0,
                last_checked: StateRecord::i64_to_timestamp(last_checked),
                last_message: row.get(3)?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, record: &StateRecord) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            &format!(
                "INSERT INTO {} (site_name, exceptional, last_checked, last_message) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT(site_name) DO UPDATE SET exceptional = excluded.exceptional, \
                 last_checked = excluded.last_checked, last_message = excluded.last_message",
                self.table
            ),
            params![
                record.site_name.clone(),
                if record.exceptional { 1i64 } else { 0i64 },
                StateRecord::timestamp_to_i64(record.last_checked),
                record.last_message.clone()
            ],
        )
        .await
        .with_context(|| format!("writing state for {}", record.site_name))?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    /// Store backed by a fresh database file; keep the dir alive for the test
    pub(crate) async fn create_test_store() -> Result<(LibsqlStateStore, TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let db_path = temp_dir.path().join("state.db");

        let pool = crate::pool::open_local(&db_path.to_string_lossy(), 2).await?;
        let store = LibsqlStateStore::new_from_pool(pool, "site_state");
        store.initialize().await?;

        Ok((store, temp_dir))
    }

    #[tokio::test]
    async fn test_missing_site_is_none() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        assert!(store.get("never-seen").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_put_then_get() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let checked = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let record = StateRecord::new("api", true, checked, "HTTP 503");
        store.put(&record).await?;

        assert_eq!(store.get("api").await?, Some(record));
        Ok(())
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_record() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();

        store.put(&StateRecord::new("api", true, first, "HTTP 503")).await?;
        store.put(&StateRecord::new("web", false, first, "HTTP 200 in 10 ms")).await?;
        store.put(&StateRecord::new("api", false, second, "HTTP 200 in 42 ms")).await?;

        let api = store.get("api").await?.unwrap();
        assert!(!api.exceptional);
        assert_eq!(api.last_checked, second);
        assert_eq!(api.last_message, "HTTP 200 in 42 ms");

        let web = store.get("web").await?.unwrap();
        assert_eq!(web.last_checked, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_is_repeatable() -> Result<()> {
        let (store, _dir) = create_test_store().await?;
        store.put(&StateRecord::new("api", true, Utc::now(), "timeout")).await?;

        store.initialize().await?;
        assert!(store.get("api").await?.is_some());
        Ok(())
    }
}
