use anyhow::Result;
use libsql::Connection;

/// Create the state table if it does not exist yet.
///
/// `table` must already be validated as a plain identifier; it is
/// interpolated into the statement.
pub async fn ensure_state_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                site_name TEXT PRIMARY KEY,
                exceptional INTEGER NOT NULL,
                last_checked INTEGER NOT NULL,
                last_message TEXT NOT NULL
            )"
        ),
        (),
    )
    .await?;

    tracing::debug!("State table {} is ready", table);
    Ok(())
}
