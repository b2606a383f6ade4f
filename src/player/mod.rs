//! Playback state of the deck.
//!
//! [`Player`] owns the storage handle and keeps the playlist, the now-playing selector,
//! the persisted offset and the playback surface in step with each other.

pub mod now_playing;
pub mod playlist;
pub mod position;
pub mod surface;

use crate::{
    config::{PlaybackConfig, UploadPolicy},
    domain::track::Track,
    storage::{error::StorageError, operations::Storage},
};

use now_playing::{NowPlaying, NowPlayingSelector};
use playlist::Playlist;
use position::PositionTracker;
use surface::{ActiveSource, PlaybackSurface, SourceLease, SourceLookup};

pub const EMPTY_LIBRARY_MESSAGE: &str = "Upload a song to play";
pub const NOTHING_SELECTED_MESSAGE: &str = "Select a song to play";

pub struct Player {
    storage: Storage,
    playlist: Playlist,
    selector: NowPlayingSelector,
    positions: PositionTracker,
    surface: PlaybackSurface,
    upload_policy: UploadPolicy,
}

impl Player {
    /// Loads the playlist, then restores the last played track.
    pub fn start(storage: Storage, config: PlaybackConfig) -> Result<Self, StorageError> {
        let playlist = Playlist::load(&storage)?;
        log::info!("loaded {} tracks", playlist.len());

        let mut player = Self {
            storage,
            playlist,
            selector: NowPlayingSelector::default(),
            positions: PositionTracker::new(config.offset_scope),
            surface: PlaybackSurface::default(),
            upload_policy: config.upload_policy,
        };

        if let Some(track) = player.selector.restore(&player.storage, &player.playlist)? {
            player.mount(track)?;
        }

        Ok(player)
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn now_playing(&self) -> &NowPlaying {
        self.selector.state()
    }

    pub fn current_source(&self) -> Option<&ActiveSource> {
        self.surface.current()
    }

    pub fn source(&self, lease: SourceLease) -> SourceLookup<'_> {
        self.surface.lookup(lease)
    }

    /// Status line shown instead of the player when nothing is active.
    pub fn message(&self) -> Option<&'static str> {
        match (self.selector.state(), self.playlist.is_empty()) {
            (NowPlaying::Active(_), _) => None,
            (NowPlaying::Empty, true) => Some(EMPTY_LIBRARY_MESSAGE),
            (NowPlaying::Empty, false) => Some(NOTHING_SELECTED_MESSAGE),
        }
    }

    /// Stores the upload, then lists it. A failed write leaves the playlist untouched.
    pub fn upload(&mut self, name: &str, data: Vec<u8>) -> Result<Track, StorageError> {
        let track = self.storage.put_track(name, data)?;
        self.playlist.add(track.clone(), self.upload_policy);
        log::info!("uploaded {} ({} bytes)", track.name, track.size());
        Ok(track)
    }

    /// Activates the first playlist entry with this name.
    pub fn select(&mut self, name: &str) -> Result<&ActiveSource, StorageError> {
        let track = self
            .playlist
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| StorageError::TrackNotFound(name.to_string()))?;

        let track = self.selector.select(&self.storage, track)?;
        self.mount(track)
    }

    /// Activates the playlist entry at `index`, which may be a later duplicate of a name.
    ///
    /// With `expected` set, the entry must carry that name, so a stale page can't pick
    /// whatever moved into the slot.
    pub fn select_at(
        &mut self,
        index: usize,
        expected: Option<&str>,
    ) -> Result<&ActiveSource, StorageError> {
        let track = self
            .playlist
            .tracks()
            .get(index)
            .filter(|t| expected.is_none_or(|name| t.name.as_str() == name))
            .cloned()
            .ok_or_else(|| {
                StorageError::TrackNotFound(format!(
                    "{} at position {index}",
                    expected.unwrap_or("entry")
                ))
            })?;

        let track = self.selector.select(&self.storage, track)?;
        self.mount(track)
    }

    /// Next track on user request. `None` when nothing is active or the playlist is empty.
    pub fn skip(&mut self) -> Result<Option<&ActiveSource>, StorageError> {
        match self.selector.skip(&self.storage, &self.playlist)? {
            Some(track) => self.mount(track).map(Some),
            None => Ok(None),
        }
    }

    /// Active track played to its end.
    ///
    /// With per-track offsets the finished track's offset is dropped, so it replays from the start.
    pub fn completed(&mut self) -> Result<Option<&ActiveSource>, StorageError> {
        let Some(finished) = self.selector.active().map(|t| t.name.clone()) else {
            return Ok(None);
        };
        self.positions.finished(&self.storage, &finished)?;

        match self.selector.completed(&self.storage, &self.playlist)? {
            Some(track) => self.mount(track).map(Some),
            None => Ok(None),
        }
    }

    /// Progress tick from the audio element. Ignored when no source is mounted.
    pub fn record_progress(&mut self, seconds: f64) -> Result<(), StorageError> {
        match self.surface.current() {
            Some(source) => self
                .positions
                .record(&self.storage, &source.track.name, seconds),
            None => Ok(()),
        }
    }

    /// Releases the playback source and closes the storage.
    pub fn shutdown(mut self) -> Result<(), StorageError> {
        self.surface.release();
        self.storage.close()
    }

    /// Seeks to the restore point only when the active track changes, remounting the
    /// same track plays it from the start.
    fn mount(&mut self, track: Track) -> Result<&ActiveSource, StorageError> {
        let same_track = self
            .surface
            .current()
            .is_some_and(|source| source.track.name == track.name);
        let resume_at = if same_track {
            None
        } else {
            self.positions.restore_point(&self.storage, &track.name)?
        };
        Ok(self.surface.activate(track, resume_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OffsetScope,
        storage::{
            operations::setup_storage,
            settings::{LAST_PLAYED_AUDIO, LAST_PLAYED_TIME},
        },
    };

    fn storage_with(names: &[&str]) -> anyhow::Result<Storage> {
        let mut storage = setup_storage()?;
        for name in names {
            storage.put_track(name, name.as_bytes().to_vec())?;
        }
        Ok(storage)
    }

    fn active_name(player: &Player) -> Option<String> {
        player
            .now_playing()
            .track()
            .map(|t| t.name.as_str().to_string())
    }

    fn playlist_names(player: &Player) -> Vec<String> {
        player
            .playlist()
            .tracks()
            .iter()
            .map(|t| t.name.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_select_and_complete_scenario() -> anyhow::Result<()> {
        let storage = storage_with(&["a.mp3", "b.mp3", "c.mp3"])?;
        let mut player = Player::start(storage, PlaybackConfig::default())?;

        player.select("b.mp3")?;
        player.completed()?;
        assert_eq!(active_name(&player).as_deref(), Some("c.mp3"));

        player.completed()?;
        assert_eq!(active_name(&player).as_deref(), Some("a.mp3"));
        Ok(())
    }

    #[test]
    fn test_messages() -> anyhow::Result<()> {
        let mut player = Player::start(setup_storage()?, PlaybackConfig::default())?;
        assert_eq!(player.message(), Some(EMPTY_LIBRARY_MESSAGE));

        player.upload("a.mp3", b"a".to_vec())?;
        assert_eq!(player.message(), Some(NOTHING_SELECTED_MESSAGE));

        player.select("a.mp3")?;
        assert_eq!(player.message(), None);
        Ok(())
    }

    #[test]
    fn test_uploads_grow_playlist() -> anyhow::Result<()> {
        let mut player = Player::start(setup_storage()?, PlaybackConfig::default())?;

        for i in 0..4 {
            player.upload(&format!("{i}.mp3"), vec![i])?;
            assert_eq!(player.playlist().len(), usize::from(i) + 1);
        }
        Ok(())
    }

    #[test]
    fn test_reupload_appends_duplicate_but_overwrites_store() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3"])?, PlaybackConfig::default())?;

        player.upload("a.mp3", b"new".to_vec())?;

        assert_eq!(playlist_names(&player), vec!["a.mp3", "a.mp3"]);
        let stored = player.storage.get_all_tracks()?;
        assert_eq!(stored.len(), 1);
        assert_eq!(&stored[0].data[..], b"new");
        Ok(())
    }

    #[test]
    fn test_reupload_with_replace_policy() -> anyhow::Result<()> {
        let config = PlaybackConfig {
            upload_policy: UploadPolicy::Replace,
            ..Default::default()
        };
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, config)?;

        player.upload("a.mp3", b"new".to_vec())?;

        assert_eq!(playlist_names(&player), vec!["a.mp3", "b.mp3"]);
        assert_eq!(&player.playlist().tracks()[0].data[..], b"new");
        Ok(())
    }

    #[test]
    fn test_failed_upload_leaves_playlist() -> anyhow::Result<()> {
        let mut player = Player::start(setup_storage()?, PlaybackConfig::default())?;

        assert!(player.upload("", b"x".to_vec()).is_err());
        assert!(player.playlist().is_empty());
        Ok(())
    }

    #[test]
    fn test_restore_on_start() -> anyhow::Result<()> {
        let storage = storage_with(&["a.mp3", "b.mp3"])?;
        storage.set_setting(LAST_PLAYED_AUDIO, "b.mp3")?;
        storage.set_setting(LAST_PLAYED_TIME, "12.5")?;

        let player = Player::start(storage, PlaybackConfig::default())?;

        assert_eq!(active_name(&player).as_deref(), Some("b.mp3"));
        let source = player.current_source().expect("mounted source");
        assert_eq!(source.resume_at, Some(12.5));
        Ok(())
    }

    #[test]
    fn test_restore_stale_name() -> anyhow::Result<()> {
        let storage = storage_with(&["a.mp3"])?;
        storage.set_setting(LAST_PLAYED_AUDIO, "gone.mp3")?;

        let player = Player::start(storage, PlaybackConfig::default())?;

        assert_eq!(player.now_playing(), &NowPlaying::Empty);
        assert!(player.current_source().is_none());
        assert_eq!(player.message(), Some(NOTHING_SELECTED_MESSAGE));
        Ok(())
    }

    #[test]
    fn test_global_offset_follows_track_switch() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, PlaybackConfig::default())?;

        player.select("a.mp3")?;
        player.record_progress(30.0)?;
        let source = player.skip()?.expect("next source");

        assert_eq!(source.track.name.as_str(), "b.mp3");
        assert_eq!(source.resume_at, Some(30.0));
        Ok(())
    }

    #[test]
    fn test_per_track_offset() -> anyhow::Result<()> {
        let config = PlaybackConfig {
            offset_scope: OffsetScope::PerTrack,
            ..Default::default()
        };
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, config)?;

        player.select("a.mp3")?;
        player.record_progress(30.0)?;
        assert_eq!(player.skip()?.expect("b").resume_at, None);

        player.record_progress(5.0)?;
        assert_eq!(player.select("a.mp3")?.resume_at, Some(30.0));
        Ok(())
    }

    #[test]
    fn test_completion_carries_global_offset() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, PlaybackConfig::default())?;

        player.select("a.mp3")?;
        player.record_progress(180.0)?;
        let source = player.completed()?.expect("next source");

        assert_eq!(source.track.name.as_str(), "b.mp3");
        assert_eq!(source.resume_at, Some(180.0));
        Ok(())
    }

    #[test]
    fn test_completion_drops_per_track_offset() -> anyhow::Result<()> {
        let config = PlaybackConfig {
            offset_scope: OffsetScope::PerTrack,
            ..Default::default()
        };
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, config)?;

        player.select("a.mp3")?;
        player.record_progress(180.0)?;
        let source = player.completed()?.expect("next source");
        assert_eq!(source.track.name.as_str(), "b.mp3");
        assert_eq!(source.resume_at, None);

        let source = player.completed()?.expect("back to a");
        assert_eq!(source.track.name.as_str(), "a.mp3");
        assert_eq!(source.resume_at, None);
        Ok(())
    }

    #[test]
    fn test_single_entry_skip_replays_from_start() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["only.mp3"])?, PlaybackConfig::default())?;

        let first = player.select("only.mp3")?.lease;
        player.record_progress(42.0)?;
        let source = player.skip()?.expect("replay");

        assert_eq!(source.track.name.as_str(), "only.mp3");
        assert_ne!(source.lease, first);
        assert_eq!(source.resume_at, None);

        player.record_progress(50.0)?;
        assert_eq!(player.completed()?.expect("replay").resume_at, None);
        Ok(())
    }

    #[test]
    fn test_select_at_picks_reuploaded_duplicate() -> anyhow::Result<()> {
        let mut storage = setup_storage()?;
        storage.put_track("a.mp3", b"old".to_vec())?;
        let mut player = Player::start(storage, PlaybackConfig::default())?;
        player.upload("a.mp3", b"new".to_vec())?;

        let source = player.select_at(1, Some("a.mp3"))?;
        assert_eq!(&source.track.data[..], b"new");

        let source = player.select_at(0, None)?;
        assert_eq!(&source.track.data[..], b"old");
        Ok(())
    }

    #[test]
    fn test_select_at_checks_bounds_and_name() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, PlaybackConfig::default())?;

        assert!(matches!(
            player.select_at(2, None).unwrap_err(),
            StorageError::TrackNotFound(_)
        ));
        assert!(matches!(
            player.select_at(0, Some("b.mp3")).unwrap_err(),
            StorageError::TrackNotFound(_)
        ));
        assert_eq!(player.now_playing(), &NowPlaying::Empty);
        Ok(())
    }

    #[test]
    fn test_next_without_active_track() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3"])?, PlaybackConfig::default())?;

        assert!(player.skip()?.is_none());
        assert!(player.completed()?.is_none());
        Ok(())
    }

    #[test]
    fn test_select_unknown() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3"])?, PlaybackConfig::default())?;

        let err = player.select("nope.mp3").unwrap_err();
        assert!(matches!(err, StorageError::TrackNotFound(_)));
        Ok(())
    }

    #[test]
    fn test_progress_without_source_is_ignored() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3"])?, PlaybackConfig::default())?;

        player.record_progress(10.0)?;
        assert_eq!(player.storage.get_setting(LAST_PLAYED_TIME)?, None);
        Ok(())
    }

    #[test]
    fn test_old_lease_is_released() -> anyhow::Result<()> {
        let mut player = Player::start(storage_with(&["a.mp3", "b.mp3"])?, PlaybackConfig::default())?;

        let first = player.select("a.mp3")?.lease;
        let second = player.select("b.mp3")?.lease;

        assert!(matches!(player.source(first), SourceLookup::Released));
        assert!(matches!(player.source(second), SourceLookup::Active(_)));
        Ok(())
    }

    #[test]
    fn test_state_survives_restart() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db = crate::config::Database {
            in_memory: false,
            path: Some(dir.path().join("deck.db")),
        };

        let mut player = Player::start(Storage::open(&db)?, PlaybackConfig::default())?;
        player.upload("a.mp3", b"a".to_vec())?;
        player.upload("b.mp3", b"b".to_vec())?;
        player.select("b.mp3")?;
        player.record_progress(7.25)?;
        player.shutdown()?;

        let player = Player::start(Storage::open(&db)?, PlaybackConfig::default())?;
        assert_eq!(playlist_names(&player), vec!["a.mp3", "b.mp3"]);
        assert_eq!(active_name(&player).as_deref(), Some("b.mp3"));
        assert_eq!(player.current_source().and_then(|s| s.resume_at), Some(7.25));
        Ok(())
    }
}
