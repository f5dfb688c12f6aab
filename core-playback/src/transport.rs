//! # Media Transport
//!
//! [`AudioTransport`] implementation over the platform media bridge.
//!
//! The transport owns exactly one [`AudioElement`], created through the host's
//! [`AudioElementFactory`] the first time something is loaded. HLS manifests are
//! handed to the [`AdaptiveStreamingEngine`] when the element cannot play them
//! natively; everything else goes straight to the element.
//!
//! Element notifications are translated into [`TransportEvent`]s with sanitized
//! values and fanned out on a broadcast channel.

use crate::error::TransportError;
use crate::traits::{AudioTransport, TransportEvent};
use async_trait::async_trait;
use bridge_traits::playback::is_hls_manifest;
use bridge_traits::{
    AdaptiveSession, AdaptiveStreamingEngine, AudioElement, AudioElementFactory,
    MediaElementEvent, HLS_MIME_TYPE,
};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Transport backed by a lazily bound platform audio element.
pub struct MediaTransport {
    factory: Arc<dyn AudioElementFactory>,
    adaptive_engine: Option<Arc<dyn AdaptiveStreamingEngine>>,
    hls_mime_type: String,
    element: OnceLock<Arc<dyn AudioElement>>,
    session: Mutex<Option<Box<dyn AdaptiveSession>>>,
    events: broadcast::Sender<TransportEvent>,
}

impl MediaTransport {
    /// Create a transport. No platform resource is bound until the first load.
    pub fn new(factory: Arc<dyn AudioElementFactory>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            factory,
            adaptive_engine: None,
            hls_mime_type: HLS_MIME_TYPE.to_string(),
            element: OnceLock::new(),
            session: Mutex::new(None),
            events,
        }
    }

    /// Use `engine` for HLS manifests the element cannot play natively.
    pub fn with_adaptive_engine(mut self, engine: Arc<dyn AdaptiveStreamingEngine>) -> Self {
        self.adaptive_engine = Some(engine);
        self
    }

    pub fn with_hls_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.hls_mime_type = mime_type.into();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        self.events = events;
        self
    }

    /// Whether the platform resource has been bound.
    pub fn is_bound(&self) -> bool {
        self.element.get().is_some()
    }

    fn bound(&self) -> Option<&Arc<dyn AudioElement>> {
        self.element.get()
    }

    fn bind(&self) -> &Arc<dyn AudioElement> {
        self.element.get_or_init(|| {
            debug!("Binding platform audio element");
            let element = self.factory.create();
            element.set_event_handler(event_forwarder(
                Arc::downgrade(&element),
                self.events.clone(),
            ));
            element
        })
    }

    fn teardown_session(&self) {
        if let Some(session) = self.session.lock().take() {
            debug!("Destroying adaptive streaming session");
            session.destroy();
        }
    }

    fn adaptive_engine_for(
        &self,
        element: &Arc<dyn AudioElement>,
        url: &str,
    ) -> Option<&Arc<dyn AdaptiveStreamingEngine>> {
        if !is_hls_manifest(url) || element.can_play_type(&self.hls_mime_type) {
            return None;
        }
        self.adaptive_engine
            .as_ref()
            .filter(|engine| engine.is_supported())
    }
}

fn event_forwarder(
    element: Weak<dyn AudioElement>,
    events: broadcast::Sender<TransportEvent>,
) -> bridge_traits::MediaEventHandler {
    Box::new(move |event| {
        let Some(element) = element.upgrade() else {
            return;
        };
        let translated = match event {
            MediaElementEvent::Ended => TransportEvent::Ended,
            MediaElementEvent::TimeUpdate => {
                TransportEvent::TimeUpdated(sanitize(element.current_time()))
            }
            MediaElementEvent::LoadedMetadata => {
                TransportEvent::DurationKnown(sanitize(element.duration()))
            }
            MediaElementEvent::DurationChange => {
                TransportEvent::DurationChanged(sanitize(element.duration()))
            }
            MediaElementEvent::Seeked => TransportEvent::Seeked(sanitize(element.current_time())),
        };
        // No subscribers is fine; nothing is listening yet.
        let _ = events.send(translated);
    })
}

/// Finite, non-negative seconds; anything else reads as zero.
fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

#[async_trait]
impl AudioTransport for MediaTransport {
    async fn load_and_play(&self, url: &str) -> Result<(), TransportError> {
        self.teardown_session();
        let element = self.bind();

        match self.adaptive_engine_for(element, url) {
            Some(engine) => {
                debug!(url = %redact_url(url), "Attaching adaptive stream");
                let session = engine
                    .attach(element, url)
                    .map_err(|e| TransportError::LoadFailed(e.to_string()))?;
                *self.session.lock() = Some(session);
            }
            None => {
                debug!(url = %redact_url(url), "Loading native source");
                element
                    .set_source(url)
                    .map_err(|e| TransportError::LoadFailed(e.to_string()))?;
            }
        }

        if let Err(e) = element.set_current_time(0.0) {
            debug!(error = %e, "Could not rewind before playback");
        }

        element
            .play()
            .await
            .map_err(|e| TransportError::PlaybackRejected(e.to_string()))
    }

    async fn pause(&self) -> Result<(), TransportError> {
        let Some(element) = self.bound() else {
            return Ok(());
        };
        element
            .pause()
            .map_err(|e| TransportError::PlaybackRejected(e.to_string()))
    }

    async fn resume(&self) -> Result<(), TransportError> {
        let Some(element) = self.bound() else {
            return Ok(());
        };
        element
            .play()
            .await
            .map_err(|e| TransportError::PlaybackRejected(e.to_string()))
    }

    fn stop(&self) {
        if let Some(element) = self.bound() {
            if let Err(e) = element.pause() {
                debug!(error = %e, "Pause during stop failed");
            }
            if let Err(e) = element.set_current_time(0.0) {
                debug!(error = %e, "Rewind during stop failed");
            }
        }
        self.teardown_session();
    }

    async fn seek(&self, seconds: f64) -> Result<f64, TransportError> {
        let target = sanitize(seconds);
        let Some(element) = self.bound() else {
            return Ok(target);
        };
        element.set_current_time(target).map_err(|e| {
            warn!(target_seconds = target, error = %e, "Seek failed");
            TransportError::SeekFailed(e.to_string())
        })?;
        Ok(target)
    }

    fn current_time(&self) -> f64 {
        self.bound()
            .map(|element| sanitize(element.current_time()))
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        let Some(element) = self.bound() else {
            return 0.0;
        };
        let duration = sanitize(element.duration());
        if duration > 0.0 {
            return duration;
        }
        element.buffered_end().map(sanitize).unwrap_or(0.0)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::MediaEventHandler;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeElement {
        calls: Mutex<Vec<String>>,
        time: Mutex<f64>,
        duration: Mutex<f64>,
        buffered_end: Mutex<Option<f64>>,
        native_hls: bool,
        reject_play: AtomicBool,
        fail_seek: AtomicBool,
        handler: Mutex<Option<MediaEventHandler>>,
    }

    impl FakeElement {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn fire(&self, event: MediaElementEvent) {
            if let Some(handler) = self.handler.lock().as_ref() {
                handler(event);
            }
        }
    }

    #[async_trait]
    impl AudioElement for FakeElement {
        fn set_source(&self, url: &str) -> BridgeResult<()> {
            self.calls.lock().push(format!("src:{url}"));
            Ok(())
        }

        async fn play(&self) -> BridgeResult<()> {
            self.calls.lock().push("play".to_string());
            if self.reject_play.load(Ordering::SeqCst) {
                return Err(BridgeError::Rejected("autoplay blocked".to_string()));
            }
            Ok(())
        }

        fn pause(&self) -> BridgeResult<()> {
            self.calls.lock().push("pause".to_string());
            Ok(())
        }

        fn current_time(&self) -> f64 {
            *self.time.lock()
        }

        fn set_current_time(&self, seconds: f64) -> BridgeResult<()> {
            if self.fail_seek.load(Ordering::SeqCst) {
                return Err(BridgeError::OperationFailed("not seekable".to_string()));
            }
            self.calls.lock().push(format!("seek:{seconds}"));
            *self.time.lock() = seconds;
            Ok(())
        }

        fn duration(&self) -> f64 {
            *self.duration.lock()
        }

        fn buffered_end(&self) -> Option<f64> {
            *self.buffered_end.lock()
        }

        fn can_play_type(&self, mime_type: &str) -> bool {
            self.native_hls && mime_type == HLS_MIME_TYPE
        }

        fn set_event_handler(&self, handler: MediaEventHandler) {
            *self.handler.lock() = Some(handler);
        }
    }

    struct FakeFactory {
        element: Arc<FakeElement>,
        created: AtomicUsize,
    }

    impl FakeFactory {
        fn new(element: FakeElement) -> Arc<Self> {
            Arc::new(Self {
                element: Arc::new(element),
                created: AtomicUsize::new(0),
            })
        }
    }

    impl AudioElementFactory for FakeFactory {
        fn create(&self) -> Arc<dyn AudioElement> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.element.clone()
        }
    }

    struct FakeSession {
        destroyed: Arc<AtomicUsize>,
    }

    impl AdaptiveSession for FakeSession {
        fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        attached: Mutex<Vec<String>>,
        destroyed: Arc<AtomicUsize>,
    }

    impl AdaptiveStreamingEngine for FakeEngine {
        fn is_supported(&self) -> bool {
            true
        }

        fn attach(
            &self,
            _element: &Arc<dyn AudioElement>,
            manifest_url: &str,
        ) -> BridgeResult<Box<dyn AdaptiveSession>> {
            self.attached.lock().push(manifest_url.to_string());
            Ok(Box::new(FakeSession {
                destroyed: self.destroyed.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_element_is_bound_lazily_once() {
        let factory = FakeFactory::new(FakeElement::default());
        let transport = MediaTransport::new(factory.clone());

        transport.pause().await.unwrap();
        transport.resume().await.unwrap();
        transport.stop();
        assert!(!transport.is_bound());
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);

        transport.load_and_play("https://x/a.mp3").await.unwrap();
        transport.load_and_play("https://x/b.mp3").await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(
            factory.element.calls(),
            vec!["src:https://x/a.mp3", "seek:0", "play", "src:https://x/b.mp3", "seek:0", "play"]
        );
    }

    #[tokio::test]
    async fn test_hls_uses_adaptive_engine_without_native_support() {
        let factory = FakeFactory::new(FakeElement::default());
        let engine = Arc::new(FakeEngine::default());
        let transport = MediaTransport::new(factory.clone()).with_adaptive_engine(engine.clone());

        transport
            .load_and_play("https://x/m.m3u8?Signature=abc")
            .await
            .unwrap();
        assert_eq!(*engine.attached.lock(), vec!["https://x/m.m3u8?Signature=abc"]);
        assert!(!factory.element.calls().iter().any(|c| c.starts_with("src:")));

        // Reloading tears the previous session down first.
        transport.load_and_play("https://x/n.m3u8").await.unwrap();
        assert_eq!(engine.destroyed.load(Ordering::SeqCst), 1);

        transport.stop();
        assert_eq!(engine.destroyed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_native_hls_skips_engine() {
        let factory = FakeFactory::new(FakeElement {
            native_hls: true,
            ..Default::default()
        });
        let engine = Arc::new(FakeEngine::default());
        let transport = MediaTransport::new(factory.clone()).with_adaptive_engine(engine.clone());

        transport.load_and_play("https://x/m.m3u8").await.unwrap();
        assert!(engine.attached.lock().is_empty());
        assert_eq!(factory.element.calls()[0], "src:https://x/m.m3u8");
    }

    #[tokio::test]
    async fn test_rejected_play_is_reported() {
        let element = FakeElement::default();
        element.reject_play.store(true, Ordering::SeqCst);
        let transport = MediaTransport::new(FakeFactory::new(element));

        let err = transport.load_and_play("https://x/a.mp3").await.unwrap_err();
        assert!(matches!(err, TransportError::PlaybackRejected(_)));
    }

    #[tokio::test]
    async fn test_seek_clamps_and_reports_failures() {
        let factory = FakeFactory::new(FakeElement::default());
        let transport = MediaTransport::new(factory.clone());

        assert_eq!(transport.seek(-5.0).await.unwrap(), 0.0);
        transport.load_and_play("https://x/a.mp3").await.unwrap();
        assert_eq!(transport.seek(-5.0).await.unwrap(), 0.0);
        assert_eq!(transport.seek(f64::NAN).await.unwrap(), 0.0);
        assert_eq!(transport.seek(42.5).await.unwrap(), 42.5);
        assert_eq!(transport.current_time(), 42.5);

        factory.element.fail_seek.store(true, Ordering::SeqCst);
        assert!(matches!(
            transport.seek(10.0).await,
            Err(TransportError::SeekFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_duration_falls_back_to_buffered_end() {
        let factory = FakeFactory::new(FakeElement::default());
        let transport = MediaTransport::new(factory.clone());
        assert_eq!(transport.duration(), 0.0);

        transport.load_and_play("https://x/a.mp3").await.unwrap();
        *factory.element.duration.lock() = f64::INFINITY;
        *factory.element.buffered_end.lock() = Some(37.0);
        assert_eq!(transport.duration(), 37.0);

        *factory.element.duration.lock() = 198.0;
        assert_eq!(transport.duration(), 198.0);

        *factory.element.time.lock() = f64::NAN;
        assert_eq!(transport.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_element_events_are_translated() {
        let factory = FakeFactory::new(FakeElement::default());
        let transport = MediaTransport::new(factory.clone());
        let mut events = transport.subscribe();
        transport.load_and_play("https://x/a.mp3").await.unwrap();

        *factory.element.duration.lock() = 198.0;
        *factory.element.time.lock() = 12.0;
        factory.element.fire(MediaElementEvent::LoadedMetadata);
        factory.element.fire(MediaElementEvent::TimeUpdate);
        factory.element.fire(MediaElementEvent::Seeked);
        *factory.element.duration.lock() = f64::NAN;
        factory.element.fire(MediaElementEvent::DurationChange);
        factory.element.fire(MediaElementEvent::Ended);

        assert_eq!(events.recv().await.unwrap(), TransportEvent::DurationKnown(198.0));
        assert_eq!(events.recv().await.unwrap(), TransportEvent::TimeUpdated(12.0));
        assert_eq!(events.recv().await.unwrap(), TransportEvent::Seeked(12.0));
        assert_eq!(events.recv().await.unwrap(), TransportEvent::DurationChanged(0.0));
        assert_eq!(events.recv().await.unwrap(), TransportEvent::Ended);
    }
}
