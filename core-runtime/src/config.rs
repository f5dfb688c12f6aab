//! # Core Configuration Module
//!
//! Provides configuration management for the Now Playing core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and settings the playback core needs.
//! It enforces fail-fast validation so a misconfigured host finds out at
//! startup rather than on the first play request.
//!
//! ## Dependencies
//!
//! - `HttpClient` - Required to reach the stream origin (desktop default: reqwest)
//! - `Clock` - Time source for stream expiry (default: `SystemClock`)
//!
//! When the `desktop-shims` feature is enabled, a reqwest-backed `HttpClient`
//! is injected automatically if none was provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .stream_origin_url("https://api.example.com")
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```
//!
//! The origin can also come from the environment:
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .stream_origin_url(stream_origin_from_env())
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the stream origin base URL.
pub const STREAM_ORIGIN_ENV: &str = "NOWPLAYING_CDN_URL";

/// Origin used when nothing else is configured.
pub const DEFAULT_STREAM_ORIGIN: &str = "http://localhost:8000";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Resolve the stream origin from [`STREAM_ORIGIN_ENV`], falling back to
/// [`DEFAULT_STREAM_ORIGIN`] when unset or blank.
pub fn stream_origin_from_env() -> String {
    origin_or_default(std::env::var(STREAM_ORIGIN_ENV).ok())
}

fn origin_or_default(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_STREAM_ORIGIN.to_string())
}

/// Core configuration for the Now Playing core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the stream origin, without a trailing slash
    pub stream_origin_url: String,

    /// HTTP client used to reach the stream origin
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for descriptor expiry
    pub clock: Arc<dyn Clock>,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Timeout applied to each stream origin request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("stream_origin_url", &self.stream_origin_url)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The stream origin is an absolute http(s) URL
    /// - The event buffer is non-zero and bounded
    /// - The request timeout is non-zero and at most five minutes
    pub fn validate(&self) -> Result<()> {
        let origin = self.stream_origin_url.as_str();
        if origin.is_empty() {
            return Err(Error::Config(
                "Stream origin URL cannot be empty".to_string(),
            ));
        }

        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Stream origin URL must start with http:// or https://, got '{}'",
                origin
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(
                "Request timeout exceeds maximum of 300 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the stream origin. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP client (URLSession/OkHttp). \
                 Web: inject a fetch-based HTTP client."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    stream_origin_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    request_timeout: Option<Duration>,
}

impl CoreConfigBuilder {
    /// Sets the stream origin base URL.
    ///
    /// Default: [`DEFAULT_STREAM_ORIGIN`]. Trailing slashes are trimmed.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .stream_origin_url("https://api.example.com/");
    /// ```
    pub fn stream_origin_url(mut self, url: impl Into<String>) -> Self {
        self.stream_origin_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the per-request timeout for stream origin calls.
    ///
    /// Default: 15 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - No `HttpClient` was provided and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let stream_origin_url = self
            .stream_origin_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_STREAM_ORIGIN.to_string());

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let config = CoreConfig {
            stream_origin_url,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            request_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}
