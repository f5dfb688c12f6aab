//! # Core Playback Traits
//!
//! Abstractions the playback controller drives. These sit one level above the
//! bridge traits: the bridge describes a raw platform media element, while
//! [`AudioTransport`] is the sanitized single-resource transport the state
//! machine talks to, and [`StreamResolver`] is the stream origin contract.
//!
//! ## Ownership
//!
//! Exactly one transport exists per controller and the controller is its only
//! mutator. Implementations must not be shared with other callers.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use core_playback::{AudioTransport, TransportEvent};
//!
//! async fn play(transport: &dyn AudioTransport, url: &str) {
//!     let mut events = transport.subscribe();
//!     transport.load_and_play(url).await.expect("playback rejected");
//!
//!     while let Ok(event) = events.recv().await {
//!         if event == TransportEvent::Ended {
//!             break;
//!         }
//!     }
//! }
//! ```

use crate::error::{ResolutionError, TransportError};
use crate::models::{StreamDescriptor, StreamRequest};
use async_trait::async_trait;
use tokio::sync::broadcast;

// ============================================================================
// Transport
// ============================================================================

/// Lifecycle notifications emitted by an [`AudioTransport`].
///
/// Seconds are already sanitized: finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    /// Playback reached the end of the stream.
    Ended,
    /// Playback position advanced.
    TimeUpdated(f64),
    /// Metadata was parsed and the total duration is known.
    DurationKnown(f64),
    /// The reported duration changed after it was first known.
    DurationChanged(f64),
    /// A seek completed at the given position.
    Seeked(f64),
}

/// The single audio-output resource, without business logic.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Tear down any adaptive session, reset the position and start `url`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::LoadFailed`] if the source could not be attached
    /// - [`TransportError::PlaybackRejected`] if the platform refused to play
    async fn load_and_play(&self, url: &str) -> Result<(), TransportError>;

    /// Pause playback. No-op if no resource is attached.
    async fn pause(&self) -> Result<(), TransportError>;

    /// Resume playback. No-op if no resource is attached.
    async fn resume(&self) -> Result<(), TransportError>;

    /// Pause, rewind to zero and tear down any adaptive session. Best effort.
    fn stop(&self);

    /// Move to `seconds` (clamped to `>= 0`). Returns the applied position.
    ///
    /// Platform failures are logged and reported as
    /// [`TransportError::SeekFailed`]; they never affect playback.
    async fn seek(&self, seconds: f64) -> Result<f64, TransportError>;

    /// Current position in seconds, `0` when unknown.
    fn current_time(&self) -> f64;

    /// Total duration in seconds, falling back to the buffered end, `0` when unknown.
    fn duration(&self) -> f64;

    /// Subscribe to lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

// ============================================================================
// Stream Resolution
// ============================================================================

/// Resolves short-lived stream descriptors from the stream origin.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Fetch a descriptor for the request.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Unavailable`] on network or remote failure
    /// - [`ResolutionError::InvalidResponse`] if the body is not a descriptor
    async fn resolve(&self, request: &StreamRequest) -> Result<StreamDescriptor, ResolutionError>;

    /// Re-issue signed URLs for an expired or expiring descriptor.
    async fn refresh(&self, request: &StreamRequest) -> Result<StreamDescriptor, ResolutionError>;
}
