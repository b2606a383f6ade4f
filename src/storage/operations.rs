use std::time::SystemTime;

use crate::{
    config,
    domain::{
        hash::ContentDigest,
        track::{Track, TrackName, TrackSummary},
    },
    storage::{
        db::{self, system_time_to_i64},
        error::StorageError,
        schema::{columns, tables},
    },
};

use anyhow::anyhow;
use columns::*;
use rusqlite::{OptionalExtension, Row, params};
use tables::*;

/// Main structure that implements all storage logic
///
/// Holds the single database connection of the process.
/// Built once with [`Storage::open`] and handed to whoever needs it.
pub struct Storage {
    pub(crate) db: rusqlite::Connection,
}

impl Storage {
    /// when called, opens a data base connection
    pub fn open(db_config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// closes the connection, reporting errors that dropping would hide
    pub fn close(self) -> Result<(), StorageError> {
        self.db.close().map_err(|(_, e)| StorageError::Database(e))
    }

    /// Stores bytes under the given name, overwriting any earlier upload with that name.
    ///
    /// Overwriting keeps the position of the track in [`Storage::get_all_tracks`].
    pub fn put_track(&mut self, name: &str, data: Vec<u8>) -> Result<Track, StorageError> {
        let name =
            TrackName::parse(name).ok_or_else(|| StorageError::InvalidTrackName(name.into()))?;
        let track = Track::new(name, data);
        let uploaded_at = system_time_to_i64(SystemTime::now()).map_err(StorageError::Internal)?;

        self.db.execute(
            &format!(
                "INSERT INTO {TRACKS} ({NAME}, {DATA}, {DIGEST}, {UPLOADED_AT})
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT({NAME}) DO UPDATE SET
                    {DATA} = excluded.{DATA},
                    {DIGEST} = excluded.{DIGEST},
                    {UPLOADED_AT} = excluded.{UPLOADED_AT}"
            ),
            params![
                track.name.as_str(),
                &track.data[..],
                track.digest.to_hex(),
                uploaded_at
            ],
        )?;

        log::debug!("stored track {} ({} bytes)", track.name, track.size());
        Ok(track)
    }

    /// returns the track stored under name, if any
    pub fn get_track(&self, name: &str) -> Result<Option<Track>, StorageError> {
        let row = self
            .db
            .query_row(
                &format!("SELECT {NAME}, {DATA}, {DIGEST} FROM {TRACKS} WHERE {NAME} = ?1"),
                params![name],
                TrackRow::from_row,
            )
            .optional()?;

        row.map(TrackRow::into_track).transpose()
    }

    /// returns every stored track in upload order
    pub fn get_all_tracks(&self) -> Result<Vec<Track>, StorageError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {NAME}, {DATA}, {DIGEST} FROM {TRACKS} ORDER BY rowid"
        ))?;

        let rows = stmt
            .query_map([], TrackRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TrackRow::into_track).collect()
    }

    /// lists stored tracks without loading their bytes
    pub fn list_tracks(&self) -> Result<Vec<TrackSummary>, StorageError> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {NAME}, length({DATA}), {DIGEST}, {UPLOADED_AT} FROM {TRACKS} ORDER BY rowid"
        ))?;

        let rows = stmt
            .query_map([], SummaryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SummaryRow::into_summary).collect()
    }
}

struct TrackRow {
    name: String,
    data: Vec<u8>,
    digest: String,
}

impl TrackRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            name: row.get(0)?,
            data: row.get(1)?,
            digest: row.get(2)?,
        })
    }

    fn into_track(self) -> Result<Track, StorageError> {
        let digest = parse_stored_digest(&self.name, &self.digest)?;
        Ok(Track::from_stored(
            parse_stored_name(&self.name)?,
            self.data,
            digest,
        ))
    }
}

struct SummaryRow {
    name: String,
    size: i64,
    digest: String,
    uploaded_at: i64,
}

impl SummaryRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            name: row.get(0)?,
            size: row.get(1)?,
            digest: row.get(2)?,
            uploaded_at: row.get(3)?,
        })
    }

    fn into_summary(self) -> Result<TrackSummary, StorageError> {
        let digest = parse_stored_digest(&self.name, &self.digest)?;
        let size = usize::try_from(self.size)
            .map_err(|e| StorageError::Internal(anyhow!("negative track size: {e}")))?;

        Ok(TrackSummary {
            name: parse_stored_name(&self.name)?,
            size,
            digest,
            uploaded_at: self.uploaded_at,
        })
    }
}

fn parse_stored_digest(name: &str, digest: &str) -> Result<ContentDigest, StorageError> {
    ContentDigest::from_hex(digest)
        .map_err(|e| StorageError::Internal(e.context(format!("bad digest stored for {name}"))))
}

fn parse_stored_name(name: &str) -> Result<TrackName, StorageError> {
    TrackName::parse(name).ok_or_else(|| {
        StorageError::Internal(anyhow!("table {TRACKS} contains invalid name {name:?}"))
    })
}

#[cfg(test)]
pub(crate) fn setup_storage() -> anyhow::Result<Storage> {
    let conn = rusqlite::Connection::open_in_memory()?;
    crate::storage::schema::init(&conn)?;
    Ok(Storage::from_existing_conn(conn))
}
