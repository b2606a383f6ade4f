use std::{fmt::Display, sync::Arc};

use super::hash::ContentDigest;

/// Longest accepted track name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Represent an uploaded audio track
///
/// The name is the identity of the track and the key it is stored under.
/// Bytes are shared, so cloning a track is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: TrackName,
    pub data: Arc<[u8]>,
    pub digest: ContentDigest,
}

impl Track {
    pub fn new(name: TrackName, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let digest = ContentDigest::from_bytes(&data);
        Self { name, data, digest }
    }

    /// Rebuilds a track whose digest was computed when it was stored.
    pub fn from_stored(
        name: TrackName,
        data: impl Into<Arc<[u8]>>,
        digest: ContentDigest,
    ) -> Self {
        Self {
            name,
            data: data.into(),
            digest,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Track metadata without the audio bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub name: TrackName,
    pub size: usize,
    pub digest: ContentDigest,
    pub uploaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackName(String);

impl TrackName {
    /// Accepts any non-blank name up to [`MAX_NAME_LEN`] bytes without control characters.
    pub fn parse(name: &str) -> Option<Self> {
        if name.trim().is_empty()
            || name.len() > MAX_NAME_LEN
            || name.chars().any(char::is_control)
        {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
pub(crate) fn mock_track(name: &str) -> Track {
    Track::new(
        TrackName::parse(name).expect("valid mock name"),
        name.as_bytes().to_vec(),
    )
}
