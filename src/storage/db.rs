use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local};
use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StorageError, schema},
};

pub type SecondsSinceUnix = i64;

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open(path)
}

pub fn open(config: &Database) -> Result<rusqlite::Connection, StorageError> {
    let db = if config.in_memory {
        open_in_memory()?
    } else {
        let path = config
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("database.path is required when database.in_memory = false"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        open_from_file(path)?
    };
    schema::init(&db)?;
    Ok(db)
}

/// converts time to number of seconds since unix_epoch
pub fn system_time_to_i64(time: SystemTime) -> anyhow::Result<SecondsSinceUnix> {
    i64::try_from(
        time.duration_since(UNIX_EPOCH)
            .with_context(|| "failed to get unix timestamp")?
            .as_secs(),
    )
    .with_context(|| "failed to get upload timestamp in seconds")
}

/// converts number of seconds since unix epoch local time to local date time
pub fn i64_seconds_to_local_time(since_unix: i64) -> anyhow::Result<DateTime<Local>> {
    let datetime = DateTime::from_timestamp_secs(since_unix).ok_or(anyhow!(
        "failed to convert {since_unix} s timestamp to datetime"
    ))?;

    Ok(DateTime::from(datetime))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use tempfile::tempdir;

    use crate::{
        config::Database,
        storage::{
            db::{open, system_time_to_i64},
            error::StorageError,
            schema,
        },
    };

    #[test]
    fn open_in_memory_db_initializes_schema() {
        let db = open(&Database::in_memory()).unwrap();

        let mut stmt = db
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        for table in schema::tables::ALL_TABLES {
            assert!(tables.contains(&table.to_string()));
        }
    }

    #[test]
    fn open_on_disk_creates_parent_dirs() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("tapedeck.db");

        open(&Database {
            in_memory: false,
            path: Some(path.clone()),
        })?;

        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn open_on_disk_without_path_fails() {
        let err = open(&Database {
            in_memory: false,
            path: None,
        })
        .unwrap_err();

        assert!(matches!(err, StorageError::Internal(_)));
    }

    #[test]
    fn system_time_converts_to_seconds() -> anyhow::Result<()> {
        let time = UNIX_EPOCH + Duration::from_millis(42_900);
        assert_eq!(system_time_to_i64(time)?, 42);
        Ok(())
    }
}
