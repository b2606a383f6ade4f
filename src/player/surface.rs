use std::fmt::Display;

use crate::domain::track::Track;

/// Handle the page streams the active track through.
///
/// A lease stays valid while its track is the active source and is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLease(pub u64);

impl Display for SourceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ActiveSource {
    pub lease: SourceLease,
    pub track: Track,
    /// offset the element seeks to once the source is loaded
    pub resume_at: Option<f64>,
}

#[derive(Debug)]
pub enum SourceLookup<'a> {
    Active(&'a ActiveSource),
    Released,
    Unknown,
}

/// Exposes the active track to the audio element.
///
/// Holds at most one source, so the bytes of tracks that stopped being active are dropped
/// as soon as another track is activated or the surface is released.
#[derive(Debug, Default)]
pub struct PlaybackSurface {
    issued: u64,
    current: Option<ActiveSource>,
}

impl PlaybackSurface {
    pub fn activate(&mut self, track: Track, resume_at: Option<f64>) -> &ActiveSource {
        self.issued += 1;
        let lease = SourceLease(self.issued);

        if let Some(old) = self.current.take() {
            log::debug!("released source {} ({})", old.lease, old.track.name);
        }
        log::debug!(
            "source {lease} -> {} resume at {:?}",
            track.name,
            resume_at
        );

        self.current.insert(ActiveSource {
            lease,
            track,
            resume_at,
        })
    }

    pub fn current(&self) -> Option<&ActiveSource> {
        self.current.as_ref()
    }

    pub fn lookup(&self, lease: SourceLease) -> SourceLookup<'_> {
        match &self.current {
            Some(source) if source.lease == lease => SourceLookup::Active(source),
            _ if lease.0 >= 1 && lease.0 <= self.issued => SourceLookup::Released,
            _ => SourceLookup::Unknown,
        }
    }

    pub fn release(&mut self) -> Option<SourceLease> {
        let released = self.current.take().map(|source| source.lease);
        if let Some(lease) = released {
            log::debug!("released source {lease}");
        }
        released
    }
}
