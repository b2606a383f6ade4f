//! Small string key-value area next to the track table.
//!
//! Holds what a browser page would keep in local storage:
//! the last played track name and the last playback offset.

use rusqlite::{OptionalExtension, params};

use crate::storage::{
    error::StorageError,
    operations::Storage,
    schema::{KEY, SETTINGS, VALUE},
};

pub const LAST_PLAYED_AUDIO: &str = "lastPlayedAudio";
pub const LAST_PLAYED_TIME: &str = "lastPlayedTime";

impl Storage {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .db
            .query_row(
                &format!("SELECT {VALUE} FROM {SETTINGS} WHERE {KEY} = ?1"),
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db.execute(
            &format!(
                "INSERT INTO {SETTINGS} ({KEY}, {VALUE}) VALUES (?1, ?2)
                 ON CONFLICT({KEY}) DO UPDATE SET {VALUE} = excluded.{VALUE}"
            ),
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_setting(&self, key: &str) -> Result<(), StorageError> {
        self.db.execute(
            &format!("DELETE FROM {SETTINGS} WHERE {KEY} = ?1"),
            params![key],
        )?;
        Ok(())
    }
}
