use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Preferences schema steps, applied in order. The database's `user_version`
/// records the last step applied.
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("schemas/schema_v1.sql"))];

fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read preferences schema version")?;
    let latest = latest_version();

    if current > latest {
        bail!("preferences database version ({current}) is newer than supported schema ({latest})");
    }

    let pending: Vec<&(i32, &str)> = MIGRATIONS
        .iter()
        .filter(|(version, _)| *version > current)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (version, sql) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("preferences migration to version {version} failed"))?;
    }
    tx.pragma_update(None, "user_version", latest)
        .context("failed to record preferences schema version")?;
    tx.commit().context("failed to commit preferences migrations")
}
