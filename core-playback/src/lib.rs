//! # Playback Core
//!
//! Session controller for single-track streaming playback.
//!
//! ## Overview
//!
//! This crate handles:
//! - Stream resolution against the stream origin ([`HttpStreamResolver`])
//! - The single audio-output resource ([`MediaTransport`])
//! - The playback state machine ([`PlaybackController`], [`PlaybackSession`])
//! - Derived views for UI surfaces ([`projection`])
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{HttpStreamResolver, MediaTransport, PlaybackConfig, PlaybackController};
//!
//! let transport = Arc::new(MediaTransport::new(audio_factory));
//! let resolver = Arc::new(HttpStreamResolver::new(http_client, origin, clock.clone()));
//! let controller =
//!     PlaybackController::new(transport, resolver, event_bus, clock, PlaybackConfig::default())?;
//!
//! controller.queue_track(track).await;
//! let mut snapshots = controller.subscribe();
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod projection;
pub mod resolver;
pub mod session;
pub mod traits;
pub mod transport;

pub use config::PlaybackConfig;
pub use controller::{PlaybackCommand, PlaybackController};
pub use error::{PlaybackError, ResolutionError, Result, TransportError};
pub use models::{
    parse_bitrates, ArtistRef, PlayState, StreamDescriptor, StreamHint, StreamRequest,
    StreamVariant, Track,
};
pub use projection::{PlayIntent, PlaybackPosition};
pub use resolver::HttpStreamResolver;
pub use session::{PlaybackSession, QueueOutcome, RequestTicket, SessionSnapshot, ToggleAction};
pub use traits::{AudioTransport, StreamResolver, TransportEvent};
pub use transport::MediaTransport;
