//! # Stream Resolution Service
//!
//! HTTP client for the stream origin. Turns a [`StreamRequest`] into a
//! [`StreamDescriptor`] holding short-lived signed URLs.
//!
//! ## Endpoints
//!
//! - `GET  {origin}/api/stream/{track_id}?artist_id=..&available_bitrates=b1,b2`
//! - `POST {origin}/api/stream/refresh` with `{track_id, artist_id, available_bitrates}`
//!
//! Both answer `{master_url, variants: [{bitrate, url}], expires_in}`.

use crate::error::ResolutionError;
use crate::models::{StreamDescriptor, StreamRequest, StreamVariant};
use crate::traits::StreamResolver;
use async_trait::async_trait;
use bridge_traits::{Clock, HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::logging::redact_url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct StreamResponseDto {
    master_url: String,
    #[serde(default)]
    variants: Vec<StreamVariantDto>,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct StreamVariantDto {
    bitrate: u32,
    url: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequestDto<'a> {
    track_id: &'a str,
    artist_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_bitrates: Option<&'a [u32]>,
}

/// [`StreamResolver`] backed by the host [`HttpClient`].
pub struct HttpStreamResolver {
    http: Arc<dyn HttpClient>,
    base_url: String,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl HttpStreamResolver {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            clock,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::none(),
        }
    }

    /// Per-request timeout handed to the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transport-level retries for idempotent lookups. Defaults to none.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve_url(&self, request: &StreamRequest) -> String {
        let mut url = format!(
            "{}/api/stream/{}?artist_id={}",
            self.base_url,
            urlencoding::encode(&request.track_id),
            urlencoding::encode(&request.artist_id)
        );
        if let Some(bitrates) = request.bitrates.as_deref().filter(|b| !b.is_empty()) {
            let joined = bitrates
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            url.push_str("&available_bitrates=");
            url.push_str(&joined);
        }
        url
    }

    fn refresh_url(&self) -> String {
        format!("{}/api/stream/refresh", self.base_url)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ResolutionError> {
        let url = redact_url(&request.url);
        let response = self
            .http
            .execute_with_retry(request.timeout(self.timeout), self.retry_policy.clone())
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Stream origin unreachable");
                ResolutionError::Unavailable(e.to_string())
            })?;

        if !response.is_success() {
            warn!(url = %url, status = response.status, "Stream origin returned an error");
            return Err(ResolutionError::Unavailable(format!(
                "stream origin returned HTTP {}",
                response.status
            )));
        }

        Ok(response)
    }

    fn parse(
        &self,
        request: &StreamRequest,
        response: &HttpResponse,
    ) -> Result<StreamDescriptor, ResolutionError> {
        let dto: StreamResponseDto = response
            .json()
            .map_err(|e| ResolutionError::InvalidResponse(e.to_string()))?;

        if dto.master_url.trim().is_empty() {
            return Err(ResolutionError::InvalidResponse(
                "master_url is empty".to_string(),
            ));
        }

        debug!(
            track_id = %request.track_id,
            master_url = %redact_url(&dto.master_url),
            variants = dto.variants.len(),
            expires_in = dto.expires_in,
            "Stream descriptor received"
        );

        Ok(StreamDescriptor {
            track_id: request.track_id.clone(),
            master_url: dto.master_url,
            variants: dto
                .variants
                .into_iter()
                .map(|v| StreamVariant {
                    bitrate: v.bitrate,
                    url: v.url,
                })
                .collect(),
            expires_in_seconds: dto.expires_in,
            fetched_at: self.clock.now(),
        })
    }
}

#[async_trait]
impl StreamResolver for HttpStreamResolver {
    #[instrument(skip(self, request), fields(track_id = %request.track_id))]
    async fn resolve(&self, request: &StreamRequest) -> Result<StreamDescriptor, ResolutionError> {
        let response = self.send(HttpRequest::get(self.resolve_url(request))).await?;
        self.parse(request, &response)
    }

    #[instrument(skip(self, request), fields(track_id = %request.track_id))]
    async fn refresh(&self, request: &StreamRequest) -> Result<StreamDescriptor, ResolutionError> {
        let body = RefreshRequestDto {
            track_id: &request.track_id,
            artist_id: &request.artist_id,
            available_bitrates: request.bitrates.as_deref(),
        };
        let http_request = HttpRequest::post(self.refresh_url())
            .json(&body)
            .map_err(|e| ResolutionError::Unavailable(e.to_string()))?;

        let response = self.send(http_request).await?;
        self.parse(request, &response)
    }
}
