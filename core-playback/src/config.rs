//! # Playback Configuration
//!
//! Tunables for the playback controller and the media transport.

use bridge_traits::HLS_MIME_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback controller configuration.
///
/// Controls resolution timeouts, refresh policy and how chatty the event bus is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    /// Maximum duration to wait for the stream origin to answer.
    ///
    /// A resolution that takes longer fails with `ResolutionError::Unavailable`.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout: Duration,

    /// How close to expiry a descriptor must be before `needs_refresh` reports it.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin: Duration,

    /// MIME type probed to decide whether the platform plays HLS natively.
    ///
    /// Default: `application/vnd.apple.mpegurl`.
    #[serde(default = "default_hls_mime_type")]
    pub hls_mime_type: String,

    /// Buffer size of the transport event channel.
    ///
    /// Time updates arrive several times per second; a lagging listener skips
    /// ahead rather than blocking the element.
    ///
    /// Default: 64 events.
    #[serde(default = "default_transport_event_capacity")]
    pub transport_event_capacity: usize,

    /// Whether position updates are published on the event bus.
    ///
    /// Snapshots on the watch channel always carry the latest position; bus
    /// subscribers only see `PositionChanged` when this is enabled.
    ///
    /// Default: true.
    #[serde(default = "default_snapshot_position_events")]
    pub snapshot_position_events: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: default_resolve_timeout(),
            refresh_margin: default_refresh_margin(),
            hls_mime_type: default_hls_mime_type(),
            transport_event_capacity: default_transport_event_capacity(),
            snapshot_position_events: default_snapshot_position_events(),
        }
    }
}

impl PlaybackConfig {
    /// Configuration for foreground UI surfaces.
    ///
    /// - Short resolve timeout (5s)
    /// - Position events on the bus
    pub fn interactive() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(5),
            snapshot_position_events: true,
            ..Default::default()
        }
    }

    /// Configuration for long background sessions.
    ///
    /// - Patient resolve timeout (30s)
    /// - Wide refresh margin (2 minutes)
    /// - No position chatter on the bus
    pub fn background() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(30),
            refresh_margin: Duration::from_secs(120),
            snapshot_position_events: false,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.resolve_timeout.is_zero() {
            return Err("resolve_timeout must be > 0".to_string());
        }

        if self.hls_mime_type.trim().is_empty() {
            return Err("hls_mime_type cannot be empty".to_string());
        }

        if self.transport_event_capacity == 0 {
            return Err("transport_event_capacity must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_refresh_margin() -> Duration {
    Duration::from_secs(30)
}

fn default_hls_mime_type() -> String {
    HLS_MIME_TYPE.to_string()
}

fn default_transport_event_capacity() -> usize {
    64
}

fn default_snapshot_position_events() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolve_timeout, Duration::from_secs(15));
        assert_eq!(config.hls_mime_type, HLS_MIME_TYPE);
    }

    #[test]
    fn test_presets() {
        let interactive = PlaybackConfig::interactive();
        assert!(interactive.validate().is_ok());
        assert!(interactive.resolve_timeout < PlaybackConfig::default().resolve_timeout);

        let background = PlaybackConfig::background();
        assert!(background.validate().is_ok());
        assert!(!background.snapshot_position_events);
        assert!(background.refresh_margin > PlaybackConfig::default().refresh_margin);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PlaybackConfig::default();

        config.resolve_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.resolve_timeout = Duration::from_secs(15);

        config.hls_mime_type = "  ".to_string();
        assert!(config.validate().is_err());
        config.hls_mime_type = HLS_MIME_TYPE.to_string();

        config.transport_event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"snapshot_position_events":false}"#).unwrap();
        assert!(!config.snapshot_position_events);
        assert_eq!(config.transport_event_capacity, 64);
        assert_eq!(config.refresh_margin, Duration::from_secs(30));
    }
}
