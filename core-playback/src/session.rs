//! # Playback Session
//!
//! The synchronous half of the playback state machine.
//!
//! [`PlaybackSession`] owns the mutable session data and every transition rule.
//! It performs no I/O: the controller asks it what to do, performs the
//! asynchronous work without holding any lock, then reports the outcome back
//! with the [`RequestTicket`] it was handed.
//!
//! ## Stale responses
//!
//! Each ticket captures the current track id and a generation counter. The
//! generation advances on every queue and every stop, so a completion carrying
//! an old ticket is recognised and discarded even if the same track was queued
//! again in between.
//!
//! ## Transitions
//!
//! ```text
//! Idle ──queue──> ResolvingStream ──resolved+started──> Playing <──toggle──> Paused
//!                        │                                 │
//!                        └──────── failure ───> Errored <──┘
//!
//! any ──stop / ended──> Stopped
//! ```

use crate::models::{PlayState, StreamDescriptor, StreamRequest, Track};
use serde::Serialize;

/// Identifies the session state an asynchronous request was issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    track_id: String,
    generation: u64,
}

impl RequestTicket {
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of queueing a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Resolution should be started with this request.
    Resolve {
        ticket: RequestTicket,
        request: StreamRequest,
    },
    /// The track has no artist id; nothing will be played.
    NoArtist,
}

/// Transport action chosen by a toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleAction {
    Pause,
    Resume,
    /// The transport holds a different URL than the descriptor (refreshed
    /// while paused, or never started): load `url` and seek to `position`.
    Reload { url: String, position: f64 },
}

/// Immutable copy of the session published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SessionSnapshot {
    pub current_track: Option<Track>,
    pub stream_descriptor: Option<StreamDescriptor>,
    pub play_state: PlayState,
    pub current_time: f64,
    pub duration: f64,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|track| track.id.as_str())
    }

    pub fn is_current(&self, track_id: &str) -> bool {
        self.current_track_id() == Some(track_id)
    }
}

/// Mutable playback session.
#[derive(Debug, Default)]
pub struct PlaybackSession {
    current_track: Option<Track>,
    stream_descriptor: Option<StreamDescriptor>,
    play_state: PlayState,
    current_time: f64,
    duration: f64,
    last_error: Option<String>,
    loaded_url: Option<String>,
    generation: u64,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn stream_descriptor(&self) -> Option<&StreamDescriptor> {
        self.stream_descriptor.as_ref()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Ticket for the current track, if any.
    pub fn current_ticket(&self) -> Option<RequestTicket> {
        self.current_track.as_ref().map(|track| RequestTicket {
            track_id: track.id.clone(),
            generation: self.generation,
        })
    }

    /// Whether `ticket` still describes the current session.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.generation == self.generation
            && self
                .current_track
                .as_ref()
                .is_some_and(|track| track.id == ticket.track_id)
    }

    /// URL the transport last started successfully for the current track.
    pub fn loaded_url(&self) -> Option<&str> {
        self.loaded_url.as_deref()
    }

    /// Whether a loaded stream currently owns the transport.
    pub fn owns_transport(&self) -> bool {
        self.stream_descriptor.is_some()
    }

    /// Make `track` current. The caller stops the transport first if a track
    /// was already current.
    pub fn queue(&mut self, track: Track) -> QueueOutcome {
        self.generation += 1;
        self.stream_descriptor = None;
        self.loaded_url = None;
        self.current_time = 0.0;
        self.duration = track.catalog_duration();
        self.last_error = None;

        let request = StreamRequest::from_track(&track);
        let ticket = RequestTicket {
            track_id: track.id.clone(),
            generation: self.generation,
        };
        self.current_track = Some(track);

        match request {
            Some(request) => {
                self.play_state = PlayState::ResolvingStream;
                QueueOutcome::Resolve { ticket, request }
            }
            None => {
                self.play_state = PlayState::Idle;
                QueueOutcome::NoArtist
            }
        }
    }

    /// Store a resolved descriptor. Returns the URL to load, or `None` if stale.
    pub fn attach_descriptor(
        &mut self,
        ticket: &RequestTicket,
        descriptor: StreamDescriptor,
    ) -> Option<String> {
        if !self.is_current(ticket) || descriptor.track_id != ticket.track_id {
            return None;
        }
        let url = descriptor.master_url.clone();
        self.stream_descriptor = Some(descriptor);
        self.last_error = None;
        Some(url)
    }

    /// Resolution failed: the descriptor stays absent and the session errors.
    pub fn fail_resolution(&mut self, ticket: &RequestTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.stream_descriptor = None;
        self.play_state = PlayState::Errored;
        self.last_error = Some(message.into());
        true
    }

    /// The transport started `url` from the beginning. Adopts
    /// `transport_duration` when it is usable.
    pub fn mark_playing(&mut self, ticket: &RequestTicket, url: &str, transport_duration: f64) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.play_state = PlayState::Playing;
        self.loaded_url = Some(url.to_string());
        self.current_time = 0.0;
        self.apply_duration(transport_duration);
        true
    }

    /// The transport refused to start or resume.
    pub fn fail_playback(&mut self, ticket: &RequestTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.play_state = PlayState::Errored;
        self.last_error = Some(message.into());
        true
    }

    /// Decide what a toggle should do. `None` while nothing is loaded or a
    /// stream is still resolving.
    ///
    /// Resuming reloads instead when the transport does not hold the
    /// descriptor's master URL.
    pub fn begin_toggle(&self) -> Option<(ToggleAction, RequestTicket)> {
        let descriptor = self.stream_descriptor.as_ref()?;
        let action = match self.play_state {
            PlayState::Playing => ToggleAction::Pause,
            PlayState::Paused | PlayState::Errored => {
                if self.loaded_url.as_deref() == Some(descriptor.master_url.as_str()) {
                    ToggleAction::Resume
                } else {
                    ToggleAction::Reload {
                        url: descriptor.master_url.clone(),
                        position: self.current_time,
                    }
                }
            }
            PlayState::Idle | PlayState::ResolvingStream | PlayState::Stopped => return None,
        };
        Some((action, self.current_ticket()?))
    }

    pub fn mark_paused(&mut self, ticket: &RequestTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.play_state = PlayState::Paused;
        true
    }

    pub fn mark_resumed(&mut self, ticket: &RequestTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.play_state = PlayState::Playing;
        self.last_error = None;
        true
    }

    /// Record a failure that does not change the play state.
    pub fn record_error(&mut self, ticket: &RequestTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.last_error = Some(message.into());
        true
    }

    /// Clear the session. Returns the id of the track that was current.
    ///
    /// Calling this repeatedly leaves the same state as calling it once.
    pub fn stop(&mut self) -> Option<String> {
        self.generation += 1;
        self.stream_descriptor = None;
        self.loaded_url = None;
        self.play_state = PlayState::Stopped;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.last_error = None;
        self.current_track.take().map(|track| track.id)
    }

    /// Clamp a seek request. `None` unless a loaded stream is playing or
    /// paused.
    ///
    /// Targets are clamped to `[0, duration]`; with no usable duration only the
    /// lower bound applies.
    pub fn seek_target(&self, seconds: f64) -> Option<(f64, RequestTicket)> {
        self.stream_descriptor.as_ref()?;
        if !matches!(self.play_state, PlayState::Playing | PlayState::Paused) {
            return None;
        }
        let ticket = self.current_ticket()?;
        let lower = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let target = if self.duration.is_finite() && self.duration > 0.0 {
            lower.min(self.duration)
        } else {
            lower
        };
        Some((target, ticket))
    }

    /// Apply a position report. Ignored without a current track.
    pub fn apply_time(&mut self, seconds: f64) -> bool {
        if self.current_track.is_none() || !seconds.is_finite() {
            return false;
        }
        let mut time = seconds.max(0.0);
        if self.duration > 0.0 {
            time = time.min(self.duration);
        }
        self.current_time = time;
        true
    }

    /// Apply a duration report. Only finite, positive values are accepted.
    pub fn apply_duration(&mut self, seconds: f64) -> bool {
        if self.current_track.is_none() || !seconds.is_finite() || seconds <= 0.0 {
            return false;
        }
        self.duration = seconds;
        if self.current_time > seconds {
            self.current_time = seconds;
        }
        true
    }

    /// Replace the descriptor after an explicit refresh.
    pub fn replace_descriptor(&mut self, ticket: &RequestTicket, descriptor: StreamDescriptor) -> bool {
        if !self.is_current(ticket) || descriptor.track_id != ticket.track_id {
            return false;
        }
        self.stream_descriptor = Some(descriptor);
        self.last_error = None;
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_track: self.current_track.clone(),
            stream_descriptor: self.stream_descriptor.clone(),
            play_state: self.play_state,
            current_time: self.current_time,
            duration: self.duration,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn track(id: &str) -> Track {
        Track::new(id, "Song", 200.0).with_artist("a1", "Artist")
    }

    fn descriptor(track_id: &str) -> StreamDescriptor {
        StreamDescriptor {
            track_id: track_id.to_string(),
            master_url: format!("https://x/{track_id}/m.m3u8"),
            variants: vec![],
            expires_in_seconds: 300,
            fetched_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    fn queued(session: &mut PlaybackSession, id: &str) -> RequestTicket {
        match session.queue(track(id)) {
            QueueOutcome::Resolve { ticket, .. } => ticket,
            QueueOutcome::NoArtist => panic!("track has an artist"),
        }
    }

    #[test]
    fn test_queue_resets_session() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");

        assert_eq!(session.play_state(), PlayState::ResolvingStream);
        assert_eq!(session.duration(), 200.0);
        assert_eq!(session.current_time(), 0.0);
        assert!(session.stream_descriptor().is_none());
        assert_eq!(ticket.track_id(), "t1");
    }

    #[test]
    fn test_queue_without_artist_stays_idle() {
        let mut session = PlaybackSession::new();
        let outcome = session.queue(Track::new("t1", "Song", 200.0));

        assert_eq!(outcome, QueueOutcome::NoArtist);
        assert_eq!(session.play_state(), PlayState::Idle);
        assert_eq!(session.snapshot().current_track_id(), Some("t1"));
    }

    #[test]
    fn test_stale_ticket_is_rejected() {
        let mut session = PlaybackSession::new();
        let first = queued(&mut session, "t1");
        let second = queued(&mut session, "t2");

        assert!(session.attach_descriptor(&first, descriptor("t1")).is_none());
        assert!(!session.fail_resolution(&first, "late"));
        assert_eq!(session.play_state(), PlayState::ResolvingStream);

        assert_eq!(
            session.attach_descriptor(&second, descriptor("t2")),
            Some("https://x/t2/m.m3u8".to_string())
        );
    }

    #[test]
    fn test_requeue_same_track_invalidates_old_ticket() {
        let mut session = PlaybackSession::new();
        let first = queued(&mut session, "t1");
        let second = queued(&mut session, "t1");

        assert_ne!(first, second);
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
    }

    #[test]
    fn test_descriptor_for_other_track_is_refused() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        assert!(session.attach_descriptor(&ticket, descriptor("t9")).is_none());
        assert!(session.stream_descriptor().is_none());
    }

    #[test]
    fn test_toggle_requires_loaded_stream() {
        let mut session = PlaybackSession::new();
        assert!(session.begin_toggle().is_none());

        let ticket = queued(&mut session, "t1");
        assert!(session.begin_toggle().is_none());

        session.attach_descriptor(&ticket, descriptor("t1"));
        // Still resolving until the transport confirms.
        assert!(session.begin_toggle().is_none());

        session.mark_playing(&ticket, "https://x/t1/m.m3u8", 198.0);
        assert_eq!(session.duration(), 198.0);
        assert_eq!(session.begin_toggle().map(|(a, _)| a), Some(ToggleAction::Pause));

        session.mark_paused(&ticket);
        assert_eq!(session.begin_toggle().map(|(a, _)| a), Some(ToggleAction::Resume));
    }

    #[test]
    fn test_toggle_reloads_after_descriptor_swap() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        session.attach_descriptor(&ticket, descriptor("t1"));
        session.mark_playing(&ticket, "https://x/t1/m.m3u8", 0.0);
        session.apply_time(42.0);
        session.mark_paused(&ticket);

        let mut fresh = descriptor("t1");
        fresh.master_url = "https://x/t1/fresh.m3u8".to_string();
        assert!(session.replace_descriptor(&ticket, fresh));

        assert_eq!(
            session.begin_toggle().map(|(a, _)| a),
            Some(ToggleAction::Reload {
                url: "https://x/t1/fresh.m3u8".to_string(),
                position: 42.0,
            })
        );
        assert_eq!(session.loaded_url(), Some("https://x/t1/m.m3u8"));
    }

    #[test]
    fn test_toggle_after_failed_start_reloads() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        session.attach_descriptor(&ticket, descriptor("t1"));
        session.fail_playback(&ticket, "autoplay blocked");

        assert!(matches!(
            session.begin_toggle(),
            Some((ToggleAction::Reload { .. }, _))
        ));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        session.attach_descriptor(&ticket, descriptor("t1"));
        session.mark_playing(&ticket, "https://x/t1/m.m3u8", 0.0);
        session.apply_time(42.0);

        assert_eq!(session.stop(), Some("t1".to_string()));
        let once = session.snapshot();
        assert_eq!(session.stop(), None);
        assert_eq!(session.snapshot(), once);

        assert_eq!(once.play_state, PlayState::Stopped);
        assert!(once.current_track.is_none());
        assert!(once.stream_descriptor.is_none());
        assert_eq!(once.current_time, 0.0);
        assert!(session.loaded_url().is_none());
        assert!(!session.is_current(&ticket));
    }

    fn playing(session: &mut PlaybackSession, track: Track) -> RequestTicket {
        let id = track.id.clone();
        let ticket = match session.queue(track) {
            QueueOutcome::Resolve { ticket, .. } => ticket,
            QueueOutcome::NoArtist => panic!("track has an artist"),
        };
        session.attach_descriptor(&ticket, descriptor(&id));
        session.mark_playing(&ticket, &format!("https://x/{id}/m.m3u8"), 0.0);
        ticket
    }

    #[test]
    fn test_seek_bounds() {
        let mut session = PlaybackSession::new();
        assert!(session.seek_target(10.0).is_none());

        let ticket = playing(&mut session, track("t1"));
        assert_eq!(session.seek_target(-5.0).unwrap().0, 0.0);
        assert_eq!(session.seek_target(300.0).unwrap().0, 200.0);
        assert_eq!(session.seek_target(f64::NAN).unwrap().0, 0.0);

        session.mark_paused(&ticket);
        assert_eq!(session.seek_target(12.0).unwrap().0, 12.0);

        let mut unknown = PlaybackSession::new();
        playing(&mut unknown, Track::new("t2", "Song", 0.0).with_artist("a1", "Artist"));
        assert_eq!(unknown.seek_target(300.0).unwrap().0, 300.0);
    }

    #[test]
    fn test_seek_requires_playing_or_paused_stream() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        assert!(session.seek_target(50.0).is_none());

        session.fail_resolution(&ticket, "Stream unavailable: 503");
        assert!(session.seek_target(50.0).is_none());

        session.queue(Track::new("t2", "Song", 200.0));
        assert_eq!(session.play_state(), PlayState::Idle);
        assert!(session.seek_target(50.0).is_none());

        let ticket = queued(&mut session, "t3");
        session.attach_descriptor(&ticket, descriptor("t3"));
        session.fail_playback(&ticket, "autoplay blocked");
        assert!(session.seek_target(50.0).is_none());
    }

    #[test]
    fn test_start_rewinds_position() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        session.attach_descriptor(&ticket, descriptor("t1"));
        session.apply_time(50.0);

        assert!(session.mark_playing(&ticket, "https://x/t1/m.m3u8", 0.0));
        assert_eq!(session.current_time(), 0.0);
        assert_eq!(session.loaded_url(), Some("https://x/t1/m.m3u8"));
    }

    #[test]
    fn test_time_and_duration_reports() {
        let mut session = PlaybackSession::new();
        assert!(!session.apply_time(10.0));

        queued(&mut session, "t1");
        assert!(session.apply_time(250.0));
        assert_eq!(session.current_time(), 200.0);

        assert!(!session.apply_duration(0.0));
        assert!(!session.apply_duration(f64::INFINITY));
        assert_eq!(session.duration(), 200.0);

        assert!(session.apply_duration(150.0));
        assert_eq!(session.current_time(), 150.0);
    }

    #[test]
    fn test_failures_set_last_error() {
        let mut session = PlaybackSession::new();
        let ticket = queued(&mut session, "t1");
        assert!(session.fail_resolution(&ticket, "Stream unavailable: 503"));
        assert_eq!(session.play_state(), PlayState::Errored);
        assert_eq!(session.last_error(), Some("Stream unavailable: 503"));

        // A fresh queue clears the previous error.
        queued(&mut session, "t2");
        assert!(session.last_error().is_none());
    }
}
