//! Media element bridge traits.
//!
//! These abstractions describe the single platform audio-output resource the
//! core drives (an HTML media element on the web, an `AVPlayer` on Apple
//! platforms, a sink on desktop) together with the optional client-side
//! adaptive streaming layer used when the platform cannot play HLS manifests
//! natively. Host applications provide concrete implementations; the core only
//! ever talks to these traits.

use crate::{error::Result, platform::PlatformSendSync};
use std::sync::Arc;

/// MIME type advertised by HLS master and variant playlists.
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Lifecycle notifications raised by a platform media element.
///
/// Values are intentionally payload-free: listeners query the element for the
/// current position or duration when they receive a notification, mirroring
/// how browser media events behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaElementEvent {
    /// Playback reached the end of the media.
    Ended,
    /// The current playback position advanced.
    TimeUpdate,
    /// Metadata (including duration) has been parsed.
    LoadedMetadata,
    /// The reported duration changed (live manifests, late index parsing).
    DurationChange,
    /// A seek operation completed.
    Seeked,
}

impl MediaElementEvent {
    /// Platform event name, matching the DOM `HTMLMediaElement` event names.
    pub fn name(&self) -> &'static str {
        match self {
            MediaElementEvent::Ended => "ended",
            MediaElementEvent::TimeUpdate => "timeupdate",
            MediaElementEvent::LoadedMetadata => "loadedmetadata",
            MediaElementEvent::DurationChange => "durationchange",
            MediaElementEvent::Seeked => "seeked",
        }
    }
}

/// Callback invoked for every [`MediaElementEvent`].
pub type MediaEventHandler = Box<dyn Fn(MediaElementEvent) + Send + Sync>;

/// A single platform audio-output resource.
///
/// Time values are expressed in seconds. Implementations may report `NaN` or
/// infinity for unknown values; callers are expected to sanitize them.
#[async_trait::async_trait]
pub trait AudioElement: PlatformSendSync {
    /// Point the element at a new media URL.
    fn set_source(&self, url: &str) -> Result<()>;

    /// Start or resume playback. Resolves once the platform accepted the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses playback (autoplay policy,
    /// unsupported source, device unavailable).
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the current position.
    fn pause(&self) -> Result<()>;

    /// Current playback position.
    fn current_time(&self) -> f64;

    /// Move the playback position. Completion is announced with
    /// [`MediaElementEvent::Seeked`].
    fn set_current_time(&self, seconds: f64) -> Result<()>;

    /// Total media duration, when known.
    fn duration(&self) -> f64;

    /// End of the last buffered range, if anything has been buffered.
    fn buffered_end(&self) -> Option<f64>;

    /// Whether the element can natively play the given MIME type.
    fn can_play_type(&self, mime_type: &str) -> bool;

    /// Install the listener that receives every lifecycle event.
    ///
    /// The core installs exactly one handler per element for its lifetime.
    fn set_event_handler(&self, handler: MediaEventHandler);
}

/// Factory used to bind the audio element lazily, on first use.
pub trait AudioElementFactory: PlatformSendSync {
    /// Create the platform audio element.
    fn create(&self) -> Arc<dyn AudioElement>;
}

/// An adaptive streaming session bound to an audio element.
pub trait AdaptiveSession: PlatformSendSync {
    /// Tear down the session and detach it from the element.
    fn destroy(&self);
}

/// Client-side adaptive streaming layer (e.g. an HLS demuxer) for platforms
/// without native manifest support.
pub trait AdaptiveStreamingEngine: PlatformSendSync {
    /// Whether the engine can run on the current platform.
    fn is_supported(&self) -> bool;

    /// Load `manifest_url` and attach the resulting stream to `element`.
    fn attach(
        &self,
        element: &Arc<dyn AudioElement>,
        manifest_url: &str,
    ) -> Result<Box<dyn AdaptiveSession>>;
}

/// Returns `true` if the URL points at an HLS manifest.
///
/// Query strings and fragments (signed URLs carry both) are ignored.
pub fn is_hls_manifest(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".m3u8")
}
