//! # Playback Error Types
//!
//! Error taxonomy for the transport, stream resolution and playback session.
//!
//! Inside the state machine none of these escape to callers: every failure is
//! caught at the async boundary that produced it and folded into the session's
//! `last_error` string plus (for everything except seeks) a transition to
//! `Errored`.

use thiserror::Error;

/// Failures reported by the audio transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The platform refused to start playback (autoplay policy, device busy).
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// The stream could not be attached to the audio element.
    #[error("Failed to load stream: {0}")]
    LoadFailed(String),

    /// The platform seek call failed. Not safety critical.
    #[error("Seek failed: {0}")]
    SeekFailed(String),
}

/// Failures reported by the stream resolution service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The origin could not be reached or returned a non-success status.
    #[error("Stream unavailable: {0}")]
    Unavailable(String),

    /// The origin answered with a body that is not a stream descriptor.
    #[error("Invalid stream descriptor: {0}")]
    InvalidResponse(String),

    /// The track carries no artist reference, so the origin cannot be queried.
    #[error("Track {0} has no artist id")]
    MissingArtist(String),
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Audio transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// Stream resolution failure.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Operation needs a current track but none is queued.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The request was superseded by a newer track swap or stop.
    #[error("Request for track {0} was superseded")]
    Superseded(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Playback configuration is invalid.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution(ResolutionError::Unavailable(_))
                | PlaybackError::Transport(TransportError::PlaybackRejected(_))
                | PlaybackError::Transport(TransportError::SeekFailed(_))
                | PlaybackError::Superseded(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Resolution(ResolutionError::Unavailable(_))
                | PlaybackError::Transport(TransportError::LoadFailed(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unavailable: PlaybackError = ResolutionError::Unavailable("503".to_string()).into();
        assert!(unavailable.is_transient());
        assert!(unavailable.is_network_error());

        let invalid: PlaybackError = ResolutionError::InvalidResponse("bad json".to_string()).into();
        assert!(!invalid.is_transient());
        assert!(!invalid.is_network_error());

        let rejected: PlaybackError =
            TransportError::PlaybackRejected("autoplay".to_string()).into();
        assert!(rejected.is_transient());
        assert!(!rejected.is_network_error());
    }

    #[test]
    fn test_transparent_messages() {
        let err: PlaybackError = TransportError::PlaybackRejected("autoplay".to_string()).into();
        assert_eq!(err.to_string(), "Playback rejected: autoplay");

        let err = PlaybackError::from(ResolutionError::MissingArtist("t1".to_string()));
        assert_eq!(err.to_string(), "Track t1 has no artist id");
    }
}
