//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP client, clock,
//! audio element factory, optional adaptive streaming engine) into a running
//! playback core. Desktop apps typically enable the `desktop-shims` feature
//! (which depends on `bridge-desktop`) so a reqwest-backed HTTP client is
//! injected automatically.
//!
//! ```ignore
//! let deps = PlayerDependencies::new(Arc::new(MyAudioFactory))
//!     .with_adaptive_engine(Arc::new(MyHlsEngine));
//! let player = PlayerService::bootstrap(deps)?;
//!
//! player.controller().queue_track(track).await;
//! player.shutdown().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::ReqwestHttpClient;

use bridge_traits::{AdaptiveStreamingEngine, AudioElementFactory};
use core_playback::{
    HttpStreamResolver, MediaTransport, PlaybackConfig, PlaybackController, StreamResolver,
};
use core_runtime::config::{stream_origin_from_env, CoreConfig};
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Aggregated handle to the host bridges the player requires beyond
/// [`CoreConfig`].
pub struct PlayerDependencies {
    pub audio_factory: Arc<dyn AudioElementFactory>,
    pub adaptive_engine: Option<Arc<dyn AdaptiveStreamingEngine>>,
    /// Overrides the HTTP resolver built from [`CoreConfig`].
    pub resolver: Option<Arc<dyn StreamResolver>>,
}

impl PlayerDependencies {
    pub fn new(audio_factory: Arc<dyn AudioElementFactory>) -> Self {
        Self {
            audio_factory,
            adaptive_engine: None,
            resolver: None,
        }
    }

    pub fn with_adaptive_engine(mut self, engine: Arc<dyn AdaptiveStreamingEngine>) -> Self {
        self.adaptive_engine = Some(engine);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Primary façade exposed to host applications.
///
/// Owns the playback controller and its transport event loop. Dropping the
/// service without calling [`PlayerService::shutdown`] leaves the event loop
/// running until the runtime shuts down.
pub struct PlayerService {
    controller: PlaybackController,
    event_bus: EventBus,
    cancel: CancellationToken,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerService {
    /// Build every component and start the transport event loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] if `config` is invalid
    /// - [`CoreError::Playback`] if `playback` is invalid
    pub fn start(
        config: CoreConfig,
        playback: PlaybackConfig,
        deps: PlayerDependencies,
    ) -> Result<Self> {
        config.validate().map_err(CoreError::from_runtime)?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let mut transport = MediaTransport::new(deps.audio_factory)
            .with_hls_mime_type(playback.hls_mime_type.clone())
            .with_event_capacity(playback.transport_event_capacity);
        if let Some(engine) = deps.adaptive_engine {
            transport = transport.with_adaptive_engine(engine);
        }

        let resolver = match deps.resolver {
            Some(resolver) => resolver,
            None => Arc::new(
                HttpStreamResolver::new(
                    config.http_client.clone(),
                    config.stream_origin_url.clone(),
                    config.clock.clone(),
                )
                .with_timeout(config.request_timeout),
            ),
        };

        let controller = PlaybackController::new(
            Arc::new(transport),
            resolver,
            event_bus.clone(),
            config.clock.clone(),
            playback,
        )?;

        let cancel = CancellationToken::new();
        let event_loop = controller.spawn_event_loop(cancel.clone());

        info!(origin = %config.stream_origin_url, "Player service started");

        Ok(Self {
            controller,
            event_bus,
            cancel,
            event_loop: Mutex::new(Some(event_loop)),
        })
    }

    /// Start with defaults: origin from the environment, default playback tuning.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CapabilityMissing`] if no HTTP client is available
    /// (the `desktop-shims` feature is disabled).
    pub fn bootstrap(deps: PlayerDependencies) -> Result<Self> {
        let config = CoreConfig::builder()
            .stream_origin_url(stream_origin_from_env())
            .build()
            .map_err(CoreError::from_runtime)?;
        Self::start(config, PlaybackConfig::default(), deps)
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Subscribe to playback and stream events.
    pub fn events(&self) -> EventStream {
        self.event_bus.stream()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stop playback and the transport event loop. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.controller.stop();
        self.cancel.cancel();

        let handle = self.event_loop.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Transport event loop ended abnormally");
            }
            debug!("Player service shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}
