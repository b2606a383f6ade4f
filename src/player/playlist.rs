use crate::{
    config::UploadPolicy,
    domain::track::Track,
    storage::{error::StorageError, operations::Storage},
};

/// Ordered in-memory view of the stored tracks.
///
/// Order is the load order followed by uploads of this session.
/// Nothing prevents a name from being listed twice.
#[derive(Debug, Default, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn load(storage: &Storage) -> Result<Self, StorageError> {
        Ok(Self::from_tracks(storage.get_all_tracks()?))
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn append(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// replaces the first entry with the same name, appends if there is none
    pub fn upsert(&mut self, track: Track) {
        match self.find_index_by_name(track.name.as_str()) {
            Some(i) => self.tracks[i] = track,
            None => self.tracks.push(track),
        }
    }

    pub fn add(&mut self, track: Track, policy: UploadPolicy) {
        match policy {
            UploadPolicy::Append => self.append(track),
            UploadPolicy::Replace => self.upsert(track),
        }
    }

    /// position of the first track with this name
    pub fn find_index_by_name(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name.as_str() == name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Track> {
        self.find_index_by_name(name).map(|i| &self.tracks[i])
    }

    /// Track that follows `name`, wrapping around at the end.
    ///
    /// A name that is not listed counts as sitting just before the first entry.
    /// Returns `None` only for an empty playlist.
    pub fn next_after(&self, name: &str) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let next = self
            .find_index_by_name(name)
            .map(|i| (i + 1) % self.tracks.len())
            .unwrap_or(0);
        self.tracks.get(next)
    }
}
