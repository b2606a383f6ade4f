use rusqlite::Connection;

pub mod tables {
    pub const TRACKS: &str = "tracks";
    pub const SETTINGS: &str = "settings";

    pub const ALL_TABLES: &[&str] = &[TRACKS, SETTINGS];
}

pub mod columns {
    pub const NAME: &str = "name";
    pub const DATA: &str = "data";
    pub const DIGEST: &str = "digest";
    pub const UPLOADED_AT: &str = "uploaded_at";
    pub const KEY: &str = "key";
    pub const VALUE: &str = "value";
}

pub use columns::*;
pub use tables::*;

// rowid order of `tracks` is the upload order, upserts keep the row
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    name TEXT NOT NULL PRIMARY KEY,
    data BLOB NOT NULL,
    digest TEXT NOT NULL,
    uploaded_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
