use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub http: HttpConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[cfg(test)]
impl Database {
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub offset_scope: OffsetScope,
    #[serde(default)]
    pub upload_policy: UploadPolicy,
}

/// Which track a persisted playback offset belongs to.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OffsetScope {
    /// One offset for whatever track is loaded; a new track resumes at the old track's position.
    #[default]
    Global,
    /// Offset remembered separately for every track name.
    PerTrack,
}

/// What an upload does to the visible playlist when the name is already listed.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadPolicy {
    /// Always append, even if this shows the same name twice.
    #[default]
    Append,
    /// Update the existing entry in place.
    Replace,
}
