use crate::{
    domain::track::Track,
    player::playlist::Playlist,
    storage::{error::StorageError, operations::Storage, settings::LAST_PLAYED_AUDIO},
};

/// The track currently targeted for playback, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NowPlaying {
    #[default]
    Empty,
    Active(Track),
}

impl NowPlaying {
    pub fn track(&self) -> Option<&Track> {
        match self {
            NowPlaying::Empty => None,
            NowPlaying::Active(track) => Some(track),
        }
    }
}

/// Tracks which single entry is active and remembers its name across restarts.
///
/// Every move into [`NowPlaying::Active`] writes the name to [`LAST_PLAYED_AUDIO`]
/// before the in-memory state changes, so a failed write leaves the state as it was.
#[derive(Debug, Default)]
pub struct NowPlayingSelector {
    state: NowPlaying,
}

impl NowPlayingSelector {
    pub fn state(&self) -> &NowPlaying {
        &self.state
    }

    pub fn active(&self) -> Option<&Track> {
        self.state.track()
    }

    /// Activates the last played track if it is still in the playlist.
    ///
    /// A stale name is not an error, the selector just stays empty.
    pub fn restore(
        &mut self,
        storage: &Storage,
        playlist: &Playlist,
    ) -> Result<Option<Track>, StorageError> {
        let Some(name) = storage.get_setting(LAST_PLAYED_AUDIO)? else {
            return Ok(None);
        };

        match playlist.find_by_name(&name) {
            Some(track) => {
                log::info!("restoring last played track {name}");
                self.activate(storage, track.clone()).map(Some)
            }
            None => {
                log::info!("last played track {name} is no longer stored, nothing to restore");
                Ok(None)
            }
        }
    }

    pub fn select(&mut self, storage: &Storage, track: Track) -> Result<Track, StorageError> {
        self.activate(storage, track)
    }

    /// Playback of the active track reached its end.
    pub fn completed(
        &mut self,
        storage: &Storage,
        playlist: &Playlist,
    ) -> Result<Option<Track>, StorageError> {
        self.advance(storage, playlist)
    }

    /// User asked for the next track.
    pub fn skip(
        &mut self,
        storage: &Storage,
        playlist: &Playlist,
    ) -> Result<Option<Track>, StorageError> {
        self.advance(storage, playlist)
    }

    /// moves to the entry after the active one, a no-op when empty or with an empty playlist
    fn advance(
        &mut self,
        storage: &Storage,
        playlist: &Playlist,
    ) -> Result<Option<Track>, StorageError> {
        let next = match &self.state {
            NowPlaying::Empty => None,
            NowPlaying::Active(current) => playlist.next_after(current.name.as_str()).cloned(),
        };

        match next {
            Some(track) => self.activate(storage, track).map(Some),
            None => Ok(None),
        }
    }

    fn activate(&mut self, storage: &Storage, track: Track) -> Result<Track, StorageError> {
        storage.set_setting(LAST_PLAYED_AUDIO, track.name.as_str())?;
        self.state = NowPlaying::Active(track.clone());
        Ok(track)
    }
}
