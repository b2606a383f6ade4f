use std::borrow::Cow;

use crate::{
    config::OffsetScope,
    domain::track::TrackName,
    storage::{error::StorageError, operations::Storage, settings::LAST_PLAYED_TIME},
};

/// Persists the playback offset of the loaded track, in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionTracker {
    scope: OffsetScope,
}

impl PositionTracker {
    pub fn new(scope: OffsetScope) -> Self {
        Self { scope }
    }

    fn key<'a>(&self, track: &'a TrackName) -> Cow<'a, str> {
        match self.scope {
            OffsetScope::Global => Cow::Borrowed(LAST_PLAYED_TIME),
            OffsetScope::PerTrack => Cow::Owned(format!("{LAST_PLAYED_TIME}:{track}")),
        }
    }

    /// Called on every progress tick. Writes are not throttled.
    pub fn record(
        &self,
        storage: &Storage,
        track: &TrackName,
        seconds: f64,
    ) -> Result<(), StorageError> {
        if !seconds.is_finite() || seconds < 0.0 {
            log::warn!("ignoring playback offset {seconds} for {track}");
            return Ok(());
        }
        storage.set_setting(&self.key(track), &seconds.to_string())
    }

    /// Offset to seek to when `track` becomes active.
    ///
    /// With [`OffsetScope::Global`] this is whatever was last recorded, for any track.
    pub fn restore_point(
        &self,
        storage: &Storage,
        track: &TrackName,
    ) -> Result<Option<f64>, StorageError> {
        let Some(value) = storage.get_setting(&self.key(track))? else {
            return Ok(None);
        };

        match value.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(Some(seconds)),
            _ => {
                log::warn!("stored playback offset {value:?} is not usable, starting from 0");
                Ok(None)
            }
        }
    }

    /// Playback of `track` reached its end.
    ///
    /// Per-track offsets are dropped so the track starts over next time. The global offset is
    /// kept and carries over to whatever track is activated next.
    pub fn finished(&self, storage: &Storage, track: &TrackName) -> Result<(), StorageError> {
        match self.scope {
            OffsetScope::Global => Ok(()),
            OffsetScope::PerTrack => self.forget(storage, track),
        }
    }

    /// drops the offset recorded for `track`
    pub fn forget(&self, storage: &Storage, track: &TrackName) -> Result<(), StorageError> {
        storage.remove_setting(&self.key(track))
    }
}
