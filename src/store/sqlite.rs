use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::migrations::run_migrations;
use super::{KeyValueStore, StoreError, StoreResult, StoreValue, ValueKind};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Preferences store persisted in SQLite, one row per key.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

fn kind_from_str(value: &str) -> Result<ValueKind, StoreError> {
    match value {
        "long" => Ok(ValueKind::Long),
        "int" => Ok(ValueKind::Int),
        "string" => Ok(ValueKind::String),
        other => Err(StoreError::Backend(format!("unknown value kind '{other}'"))),
    }
}

fn decode_row(
    key: &str,
    kind: &str,
    int_value: Option<i64>,
    text_value: Option<String>,
) -> Result<StoreValue, StoreError> {
    let missing = || StoreError::Backend(format!("key '{key}' has no stored {kind} value"));
    match kind_from_str(kind)? {
        ValueKind::Long => int_value.map(StoreValue::Long).ok_or_else(missing),
        ValueKind::Int => {
            let raw = int_value.ok_or_else(missing)?;
            i32::try_from(raw).map(StoreValue::Int).map_err(|_| {
                StoreError::Backend(format!("key '{key}' holds {raw}, outside int range"))
            })
        }
        ValueKind::String => text_value.map(StoreValue::String).ok_or_else(missing),
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl SqliteStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            log_error!("Failed to enable WAL mode: {err}");
        }

        let store = Self::from_connection(conn, Some(db_path))?;
        if let Some(path) = store.path() {
            log_info!("Preferences store opened at {}", path.display());
        }
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        run_migrations(&mut conn).context("failed to run preferences migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        self.upsert(key, ValueKind::Long, Some(value), None)
    }

    pub fn put_i32(&self, key: &str, value: i32) -> Result<()> {
        self.upsert(key, ValueKind::Int, Some(i64::from(value)), None)
    }

    pub fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.upsert(key, ValueKind::String, None, Some(value))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.lock()
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove preference {key}"))?;
        Ok(())
    }

    fn upsert(
        &self,
        key: &str,
        kind: ValueKind,
        int_value: Option<i64>,
        text_value: Option<&str>,
    ) -> Result<()> {
        self.lock()
            .execute(
                "INSERT INTO preferences (key, kind, int_value, text_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     kind = excluded.kind,
                     int_value = excluded.int_value,
                     text_value = excluded.text_value,
                     updated_at = excluded.updated_at",
                params![
                    key,
                    kind.as_str(),
                    int_value,
                    text_value,
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("failed to write preference {key}"))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn fetch(&self, key: &str) -> StoreResult<Option<StoreValue>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT kind, int_value, text_value FROM preferences WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        row.map(|(kind, int_value, text_value)| decode_row(key, &kind, int_value, text_value))
            .transpose()
    }
}

impl KeyValueStore for SqliteStore {
    fn contains(&self, key: &str) -> bool {
        let conn = self.lock();
        match conn
            .query_row(
                "SELECT 1 FROM preferences WHERE key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()
        {
            Ok(found) => found.is_some(),
            Err(err) => {
                log_error!("Failed to look up preference {key}: {err}");
                false
            }
        }
    }

    fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64> {
        match self.fetch(key)? {
            None => Ok(default),
            Some(StoreValue::Long(value)) => Ok(value),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::Long, other.kind())),
        }
    }

    fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32> {
        match self.fetch(key)? {
            None => Ok(default),
            Some(StoreValue::Int(value)) => Ok(value),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::Int, other.kind())),
        }
    }

    fn get_string(&self, key: &str, default: &str) -> StoreResult<String> {
        match self.fetch(key)? {
            None => Ok(default.to_string()),
            Some(StoreValue::String(value)) => Ok(value),
            Some(other) => Err(StoreError::mismatch(key, ValueKind::String, other.kind())),
        }
    }

    fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT key, kind, int_value, text_value
                 FROM preferences
                 ORDER BY key",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        let mut entries = BTreeMap::new();
        for (key, kind, int_value, text_value) in rows {
            let value = decode_row(&key, &kind, int_value, text_value)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }
}

/// Writes a known set of widget values under the single `flutter.` prefix the
/// app's preferences plugin produces, clearing the doubled-prefix leftovers so
/// the widget can be checked end to end without the app running.
pub fn seed_sample_data(store: &SqliteStore) -> Result<()> {
    for suffix in [
        "appWidgetCaloriesPercent",
        "appWidgetCaloriesConsumed",
        "appWidgetCaloriesGoal",
        "appWidgetLastUpdated",
    ] {
        store.remove(&format!("flutter.flutter.{suffix}"))?;
    }

    store.put_i64("flutter.appWidgetCaloriesPercent", 75)?;
    store.put_i64("flutter.appWidgetCaloriesConsumed", 1500)?;
    store.put_i64("flutter.appWidgetCaloriesGoal", 2000)?;
    store.put_string("flutter.appWidgetLastUpdated", "12:34")?;

    log_info!("Sample widget data saved");
    Ok(())
}
