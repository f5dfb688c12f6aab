//! # Playback Controller
//!
//! Drives the [`PlaybackSession`] state machine against the transport and the
//! stream resolver, and publishes every change.
//!
//! ## Overview
//!
//! Each command runs in two halves:
//!
//! 1. A synchronous half that takes the session lock, applies the immediate
//!    transition (implicit stop, `ResolvingStream`, clamping) and hands back a
//!    [`RequestTicket`] for any follow-up work.
//! 2. An asynchronous half that awaits the resolver or transport with no lock
//!    held, then reports the outcome through the ticket. Outcomes whose ticket
//!    is no longer current are dropped.
//!
//! Because the synchronous half runs before the caller's future is first
//! polled (or inside [`PlaybackController::dispatch`] before spawning),
//! transitions happen in the order commands were issued.
//!
//! ## Observing
//!
//! - [`PlaybackController::subscribe`] returns a `watch` receiver that always
//!   holds the latest [`SessionSnapshot`].
//! - Typed [`CoreEvent`]s go out on the shared [`EventBus`].
//!
//! ## Lifecycle
//!
//! ```ignore
//! let controller = PlaybackController::new(transport, resolver, event_bus, clock, config)?;
//! let cancel = CancellationToken::new();
//! let event_loop = controller.spawn_event_loop(cancel.clone());
//!
//! controller.queue_track(track).await;
//! controller.toggle_playback().await;
//!
//! cancel.cancel();
//! event_loop.await?;
//! ```

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, ResolutionError, Result};
use crate::models::{PlayState, StreamDescriptor, StreamRequest, Track};
use crate::projection::{self, PlayIntent};
use crate::session::{PlaybackSession, QueueOutcome, RequestTicket, SessionSnapshot, ToggleAction};
use crate::traits::{AudioTransport, StreamResolver, TransportEvent};
use bridge_traits::Clock;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, StreamEvent};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Commands accepted by [`PlaybackController::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    QueueTrack(Track),
    TogglePlayback,
    Stop,
    Seek(f64),
    PlayOrToggle(Track),
    RefreshStream,
}

/// Follow-up work produced by the synchronous half of a command.
#[derive(Debug)]
enum Step {
    Done,
    Resolve {
        ticket: RequestTicket,
        request: StreamRequest,
    },
    Toggle {
        action: ToggleAction,
        ticket: RequestTicket,
    },
    Seek {
        target: f64,
        ticket: RequestTicket,
    },
    Refresh,
}

struct ControllerInner {
    session: Mutex<PlaybackSession>,
    transport: Arc<dyn AudioTransport>,
    resolver: Arc<dyn StreamResolver>,
    event_bus: EventBus,
    snapshots: watch::Sender<SessionSnapshot>,
    clock: Arc<dyn Clock>,
    config: PlaybackConfig,
}

/// The playback state machine with its collaborators.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("session", &*self.inner.session.lock())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl PlaybackController {
    /// Create a controller that exclusively owns `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        transport: Arc<dyn AudioTransport>,
        resolver: Arc<dyn StreamResolver>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        let (snapshots, _) = watch::channel(SessionSnapshot::default());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                session: Mutex::new(PlaybackSession::new()),
                transport,
                resolver,
                event_bus,
                snapshots,
                clock,
                config,
            }),
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.lock().snapshot()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    /// Whether the loaded descriptor is within the configured refresh margin.
    pub fn needs_refresh(&self) -> bool {
        projection::needs_refresh(
            &self.snapshot(),
            self.inner.clock.now(),
            self.inner.config.refresh_margin,
        )
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Make `track` current and start it.
    ///
    /// Any current track is stopped first. Tracks without an artist id leave
    /// the session `Idle` and never reach the resolver.
    pub fn queue_track(&self, track: Track) -> impl Future<Output = ()> + Send + 'static {
        self.command(PlaybackCommand::QueueTrack(track))
    }

    /// Pause when playing, resume when paused. Dropped while nothing is loaded.
    pub fn toggle_playback(&self) -> impl Future<Output = ()> + Send + 'static {
        self.command(PlaybackCommand::TogglePlayback)
    }

    /// Stop the transport and clear the session. Idempotent.
    pub fn stop(&self) {
        let mut session = self.inner.session.lock();
        self.stop_locked(&mut session, false);
        self.publish(&session);
    }

    /// Seek the current track, clamped to `[0, duration]`. Dropped unless a
    /// loaded stream is playing or paused.
    pub fn seek(&self, seconds: f64) -> impl Future<Output = ()> + Send + 'static {
        self.command(PlaybackCommand::Seek(seconds))
    }

    /// Toggle `track` if it is current, otherwise queue it.
    pub fn play_or_toggle(&self, track: Track) -> impl Future<Output = ()> + Send + 'static {
        self.command(PlaybackCommand::PlayOrToggle(track))
    }

    /// Run `command` in the background.
    ///
    /// The immediate transition is applied before this returns. Must be
    /// called from within a Tokio runtime.
    pub fn dispatch(&self, command: PlaybackCommand) -> JoinHandle<()> {
        tokio::spawn(self.command(command))
    }

    fn command(&self, command: PlaybackCommand) -> impl Future<Output = ()> + Send + 'static {
        let step = self.prepare(command);
        let this = self.clone();
        async move { this.run(step).await }
    }

    fn prepare(&self, command: PlaybackCommand) -> Step {
        let mut session = self.inner.session.lock();
        let step = match command {
            PlaybackCommand::QueueTrack(track) => self.begin_queue(&mut session, track),
            PlaybackCommand::TogglePlayback => self.begin_toggle(&session),
            PlaybackCommand::Stop => {
                self.stop_locked(&mut session, false);
                Step::Done
            }
            PlaybackCommand::Seek(seconds) => match session.seek_target(seconds) {
                Some((target, ticket)) => Step::Seek { target, ticket },
                None => {
                    debug!("Seek ignored: no current track");
                    Step::Done
                }
            },
            PlaybackCommand::PlayOrToggle(track) => {
                match projection::play_intent(&session.snapshot(), &track) {
                    PlayIntent::Toggle => self.begin_toggle(&session),
                    PlayIntent::Queue => self.begin_queue(&mut session, track),
                }
            }
            PlaybackCommand::RefreshStream => Step::Refresh,
        };
        self.publish(&session);
        step
    }

    fn begin_queue(&self, session: &mut PlaybackSession, track: Track) -> Step {
        if session.current_track().is_some() {
            self.stop_locked(session, false);
        }

        let track_id = track.id.clone();
        let title = track.title.clone();
        let outcome = session.queue(track);
        info!(track_id = %track_id, "Track queued");
        self.emit(PlaybackEvent::TrackQueued {
            track_id: track_id.clone(),
            title,
        });

        match outcome {
            QueueOutcome::Resolve { ticket, request } => Step::Resolve { ticket, request },
            QueueOutcome::NoArtist => {
                let error = ResolutionError::MissingArtist(track_id.clone());
                warn!(track_id = %track_id, "Track has no artist id, not resolving");
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track_id),
                    message: error.to_string(),
                    recoverable: false,
                });
                Step::Done
            }
        }
    }

    fn begin_toggle(&self, session: &PlaybackSession) -> Step {
        match session.begin_toggle() {
            Some((action, ticket)) => Step::Toggle { action, ticket },
            None => {
                debug!(state = session.play_state().as_str(), "Toggle dropped");
                Step::Done
            }
        }
    }

    fn stop_locked(&self, session: &mut PlaybackSession, completed: bool) {
        self.inner.transport.stop();
        if let Some(track_id) = session.stop() {
            info!(track_id = %track_id, completed, "Playback stopped");
            let event = if completed {
                PlaybackEvent::Completed { track_id }
            } else {
                PlaybackEvent::Stopped { track_id }
            };
            self.emit(event);
        }
    }

    async fn run(&self, step: Step) {
        match step {
            Step::Done => {}
            Step::Resolve { ticket, request } => self.resolve(ticket, request).await,
            Step::Toggle { action, ticket } => self.toggle(action, ticket).await,
            Step::Seek { target, ticket } => self.seek_to(target, ticket).await,
            Step::Refresh => {
                if let Err(e) = self.refresh_stream().await {
                    warn!(error = %e, "Stream refresh failed");
                }
            }
        }
    }

    // ========================================================================
    // Resolution and start
    // ========================================================================

    #[instrument(skip(self, ticket, request), fields(track_id = %ticket.track_id()))]
    async fn resolve(&self, ticket: RequestTicket, request: StreamRequest) {
        let result = self
            .with_resolve_timeout(self.inner.resolver.resolve(&request))
            .await
            .and_then(|descriptor| matching_descriptor(&ticket, descriptor));

        let url = {
            let mut session = self.inner.session.lock();
            match result {
                Ok(descriptor) => {
                    let resolved = StreamEvent::Resolved {
                        track_id: descriptor.track_id.clone(),
                        variant_count: descriptor.variants.len(),
                        expires_at: descriptor.expires_at().timestamp(),
                    };
                    let Some(url) = session.attach_descriptor(&ticket, descriptor) else {
                        debug!("Discarding stale stream descriptor");
                        return;
                    };
                    self.emit_stream(resolved);
                    self.publish(&session);
                    url
                }
                Err(e) => {
                    if session.fail_resolution(&ticket, e.to_string()) {
                        warn!(error = %e, "Stream resolution failed");
                        self.emit_stream(StreamEvent::Failed {
                            track_id: ticket.track_id().to_string(),
                            message: e.to_string(),
                        });
                        self.emit(PlaybackEvent::Error {
                            track_id: Some(ticket.track_id().to_string()),
                            message: e.to_string(),
                            recoverable: true,
                        });
                        self.publish(&session);
                    } else {
                        debug!(error = %e, "Discarding stale resolution failure");
                    }
                    return;
                }
            }
        };

        self.start(&ticket, &url).await;
    }

    async fn start(&self, ticket: &RequestTicket, url: &str) {
        let result = self.inner.transport.load_and_play(url).await;
        let transport_duration = self.inner.transport.duration();

        let mut session = self.inner.session.lock();
        match result {
            Ok(()) => {
                if !session.mark_playing(ticket, url, transport_duration) {
                    // A newer command took over while loading. Silence this
                    // load unless a newer stream already owns the transport.
                    if !session.owns_transport() {
                        debug!("Stale load finished, silencing transport");
                        self.inner.transport.stop();
                    }
                    return;
                }
                let title = session
                    .current_track()
                    .map(|track| track.title.clone())
                    .unwrap_or_default();
                info!(track_id = %ticket.track_id(), "Playback started");
                self.emit(PlaybackEvent::Started {
                    track_id: ticket.track_id().to_string(),
                    title,
                });
                self.publish(&session);
            }
            Err(e) => {
                if session.fail_playback(ticket, e.to_string()) {
                    warn!(track_id = %ticket.track_id(), error = %e, "Transport refused playback");
                    self.emit(PlaybackEvent::Error {
                        track_id: Some(ticket.track_id().to_string()),
                        message: e.to_string(),
                        recoverable: true,
                    });
                    self.publish(&session);
                }
            }
        }
    }

    async fn with_resolve_timeout<F>(&self, future: F) -> std::result::Result<StreamDescriptor, ResolutionError>
    where
        F: Future<Output = std::result::Result<StreamDescriptor, ResolutionError>>,
    {
        let limit = self.inner.config.resolve_timeout;
        tokio::time::timeout(limit, future)
            .await
            .unwrap_or_else(|_| {
                Err(ResolutionError::Unavailable(format!(
                    "stream origin did not answer within {}s",
                    limit.as_secs_f64()
                )))
            })
    }

    // ========================================================================
    // Toggle and seek
    // ========================================================================

    async fn toggle(&self, action: ToggleAction, ticket: RequestTicket) {
        match action {
            ToggleAction::Pause => {
                let result = self.inner.transport.pause().await;
                let mut session = self.inner.session.lock();
                match result {
                    Ok(()) => {
                        if session.mark_paused(&ticket) {
                            self.emit(PlaybackEvent::Paused {
                                track_id: ticket.track_id().to_string(),
                                position_ms: to_millis(session.current_time()),
                            });
                        }
                    }
                    Err(e) => {
                        if session.record_error(&ticket, e.to_string()) {
                            warn!(error = %e, "Pause failed");
                            self.emit_error(&ticket, e.to_string());
                        }
                    }
                }
                self.publish(&session);
            }
            ToggleAction::Resume => {
                let result = self.inner.transport.resume().await;
                let mut session = self.inner.session.lock();
                match result {
                    Ok(()) => {
                        if session.mark_resumed(&ticket) {
                            self.emit(PlaybackEvent::Resumed {
                                track_id: ticket.track_id().to_string(),
                                position_ms: to_millis(session.current_time()),
                            });
                        }
                    }
                    Err(e) => {
                        if session.fail_playback(&ticket, e.to_string()) {
                            warn!(error = %e, "Resume failed");
                            self.emit_error(&ticket, e.to_string());
                        }
                    }
                }
                self.publish(&session);
            }
            ToggleAction::Reload { url, position } => {
                debug!(track_id = %ticket.track_id(), "Transport holds an old stream, reloading");
                self.reload(ticket, &url, position).await;
            }
        }
    }

    /// Load `url` from the start, then seek back to `position` once playing.
    async fn reload(&self, ticket: RequestTicket, url: &str, position: f64) {
        self.start(&ticket, url).await;
        if position <= 0.0 {
            return;
        }
        let started = {
            let session = self.inner.session.lock();
            session.is_current(&ticket) && session.play_state() == PlayState::Playing
        };
        if started {
            self.seek_to(position, ticket).await;
        }
    }

    async fn seek_to(&self, target: f64, ticket: RequestTicket) {
        let result = self.inner.transport.seek(target).await;
        let mut session = self.inner.session.lock();
        match result {
            Ok(applied) => {
                if session.is_current(&ticket) && session.apply_time(applied) {
                    self.emit_position(&session, ticket.track_id());
                }
            }
            Err(e) => {
                if session.record_error(&ticket, e.to_string()) {
                    self.emit_error(&ticket, e.to_string());
                }
            }
        }
        self.publish(&session);
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Re-issue signed URLs for the current track.
    ///
    /// A playing (or errored) session reloads the transport and seeks back to
    /// where it was. A paused one swaps the descriptor; the next toggle then
    /// loads the new URL at the paused position. Failures are recorded in
    /// `last_error` without changing the play state.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NoTrackLoaded`] without a current track
    /// - [`PlaybackError::Resolution`] if the origin refused the refresh
    /// - [`PlaybackError::Superseded`] if another command replaced the track meanwhile
    #[instrument(skip(self))]
    pub async fn refresh_stream(&self) -> Result<()> {
        let (ticket, request) = {
            let session = self.inner.session.lock();
            let track = session.current_track().ok_or(PlaybackError::NoTrackLoaded)?;
            if session.play_state() == PlayState::ResolvingStream {
                debug!("Refresh dropped: resolution already in flight");
                return Ok(());
            }
            let request = StreamRequest::from_track(track)
                .ok_or_else(|| ResolutionError::MissingArtist(track.id.clone()))?;
            let ticket = session.current_ticket().ok_or(PlaybackError::NoTrackLoaded)?;
            (ticket, request)
        };

        let result = self
            .with_resolve_timeout(self.inner.resolver.refresh(&request))
            .await
            .and_then(|descriptor| matching_descriptor(&ticket, descriptor));

        let reload = {
            let mut session = self.inner.session.lock();
            let descriptor = match result {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    if session.record_error(&ticket, e.to_string()) {
                        warn!(error = %e, "Stream refresh failed");
                        self.emit_stream(StreamEvent::Failed {
                            track_id: ticket.track_id().to_string(),
                            message: e.to_string(),
                        });
                        self.publish(&session);
                    }
                    return Err(e.into());
                }
            };

            let state = session.play_state();
            let position = session.current_time();
            let url = descriptor.master_url.clone();
            let refreshed = StreamEvent::Refreshed {
                track_id: descriptor.track_id.clone(),
                expires_at: descriptor.expires_at().timestamp(),
            };
            if !session.replace_descriptor(&ticket, descriptor) {
                return Err(PlaybackError::Superseded(ticket.track_id().to_string()));
            }
            info!(track_id = %ticket.track_id(), "Stream refreshed");
            self.emit_stream(refreshed);
            self.publish(&session);

            matches!(state, PlayState::Playing | PlayState::Errored).then_some((url, position))
        };

        if let Some((url, position)) = reload {
            self.reload(ticket, &url, position).await;
        }
        Ok(())
    }

    // ========================================================================
    // Transport events
    // ========================================================================

    /// Spawn the task that feeds transport events into the session.
    ///
    /// The subscription is taken before this returns, so no event emitted
    /// afterwards is missed. The task ends when `cancel` fires or the
    /// transport's channel closes.
    pub fn spawn_event_loop(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut events = self.inner.transport.subscribe();
        let this = self.clone();

        tokio::spawn(async move {
            debug!("Transport event loop started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => this.handle_transport_event(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Transport event loop lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("Transport event loop stopped");
        })
    }

    /// Apply one transport event to the session.
    pub fn handle_transport_event(&self, event: TransportEvent) {
        let mut session = self.inner.session.lock();
        match event {
            TransportEvent::Ended => {
                if !matches!(session.play_state(), PlayState::Playing | PlayState::Paused) {
                    debug!(state = session.play_state().as_str(), "Ignoring end of stream");
                    return;
                }
                self.stop_locked(&mut session, true);
            }
            TransportEvent::TimeUpdated(seconds) | TransportEvent::Seeked(seconds) => {
                if !session.apply_time(seconds) {
                    return;
                }
                if let Some(track_id) = session.current_track().map(|t| t.id.clone()) {
                    self.emit_position(&session, &track_id);
                }
            }
            TransportEvent::DurationKnown(seconds) | TransportEvent::DurationChanged(seconds) => {
                if !session.apply_duration(seconds) {
                    return;
                }
                if let Some(track) = session.current_track() {
                    self.emit(PlaybackEvent::DurationChanged {
                        track_id: track.id.clone(),
                        duration_ms: to_millis(seconds),
                    });
                }
            }
        }
        self.publish(&session);
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    fn publish(&self, session: &PlaybackSession) {
        let next = session.snapshot();
        self.inner.snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.inner.event_bus.emit(CoreEvent::Playback(event));
    }

    fn emit_stream(&self, event: StreamEvent) {
        let _ = self.inner.event_bus.emit(CoreEvent::Stream(event));
    }

    fn emit_error(&self, ticket: &RequestTicket, message: String) {
        self.emit(PlaybackEvent::Error {
            track_id: Some(ticket.track_id().to_string()),
            message,
            recoverable: true,
        });
    }

    fn emit_position(&self, session: &PlaybackSession, track_id: &str) {
        if !self.inner.config.snapshot_position_events {
            return;
        }
        self.emit(PlaybackEvent::PositionChanged {
            track_id: track_id.to_string(),
            position_ms: to_millis(session.current_time()),
            duration_ms: to_millis(session.duration()),
        });
    }
}

fn matching_descriptor(
    ticket: &RequestTicket,
    descriptor: StreamDescriptor,
) -> std::result::Result<StreamDescriptor, ResolutionError> {
    if descriptor.track_id == ticket.track_id() {
        Ok(descriptor)
    } else {
        Err(ResolutionError::InvalidResponse(format!(
            "descriptor for track {} returned for {}",
            descriptor.track_id,
            ticket.track_id()
        )))
    }
}

fn to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_millis() {
        assert_eq!(to_millis(1.2345), 1235);
        assert_eq!(to_millis(-3.0), 0);
        assert_eq!(to_millis(f64::NAN), 0);
    }

    #[test]
    fn test_matching_descriptor_rejects_other_track() {
        let mut session = PlaybackSession::new();
        let ticket = match session.queue(Track::new("t1", "Song", 200.0).with_artist("a1", "A")) {
            QueueOutcome::Resolve { ticket, .. } => ticket,
            QueueOutcome::NoArtist => unreachable!(),
        };
        let descriptor = StreamDescriptor {
            track_id: "t2".to_string(),
            master_url: "https://x/m.m3u8".to_string(),
            variants: vec![],
            expires_in_seconds: 300,
            fetched_at: chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap(),
        };
        assert!(matches!(
            matching_descriptor(&ticket, descriptor),
            Err(ResolutionError::InvalidResponse(_))
        ));
    }
}
