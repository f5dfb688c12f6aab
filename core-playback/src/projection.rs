//! # Projections
//!
//! Read-only views derived from a [`SessionSnapshot`]. Every function here is
//! pure; UI surfaces recompute them whenever a new snapshot is published.

use crate::models::{PlayState, Track};
use crate::session::SessionSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Position of a track as a UI row should render it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackPosition {
    pub time: f64,
    pub duration: f64,
}

impl PlaybackPosition {
    /// Progress in `[0, 1]`; zero when the duration is unknown.
    pub fn fraction(&self) -> f64 {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return 0.0;
        }
        (self.time / self.duration).clamp(0.0, 1.0)
    }
}

/// What a play button for a given track should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayIntent {
    /// The track is not current: queue it.
    Queue,
    /// The track is current: toggle pause/resume.
    Toggle,
}

/// True iff `track_id` is current and audibly playing.
pub fn is_track_active(snapshot: &SessionSnapshot, track_id: &str) -> bool {
    snapshot.is_current(track_id) && snapshot.play_state.is_audible()
}

/// Live position for the current track, catalog metadata for any other.
pub fn effective_position(snapshot: &SessionSnapshot, track: &Track) -> PlaybackPosition {
    if snapshot.is_current(&track.id) {
        PlaybackPosition {
            time: snapshot.current_time,
            duration: snapshot.duration,
        }
    } else {
        PlaybackPosition {
            time: 0.0,
            duration: track.catalog_duration(),
        }
    }
}

/// True iff `track_id` is current and its stream is still resolving.
pub fn is_buffering(snapshot: &SessionSnapshot, track_id: &str) -> bool {
    snapshot.is_current(track_id) && snapshot.play_state == PlayState::ResolvingStream
}

/// Id of the track that is current and playing, if any.
pub fn active_track_id(snapshot: &SessionSnapshot) -> Option<&str> {
    snapshot
        .current_track_id()
        .filter(|_| snapshot.play_state.is_audible())
}

pub fn play_intent(snapshot: &SessionSnapshot, track: &Track) -> PlayIntent {
    if snapshot.is_current(&track.id) {
        PlayIntent::Toggle
    } else {
        PlayIntent::Queue
    }
}

/// Whether the loaded descriptor expires within `margin` of `now`.
///
/// Refreshing is never automatic; hosts poll this during long sessions and
/// call `PlaybackController::refresh_stream` themselves.
pub fn needs_refresh(snapshot: &SessionSnapshot, now: DateTime<Utc>, margin: Duration) -> bool {
    snapshot
        .stream_descriptor
        .as_ref()
        .is_some_and(|descriptor| descriptor.expires_within(now, margin))
}
