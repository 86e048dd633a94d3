use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reviewsync_protocol::ids::ReviewId;
use reviewsync_protocol::snapshot::{AnalysisStatus, ReviewSnapshot};
use reviewsync_protocol::{LiveEvent, SyncError, SyncResult};

use crate::sse::{parse_event_frame, SseFrameDecoder};
use crate::{LiveChannelSource, LiveEventStream, LiveEventSubscription, SnapshotSource, StatusSource};

const ENV_BASE_URL: &str = "REVIEWSYNC_BASE_URL";
const ENV_BEARER_TOKEN: &str = "REVIEWSYNC_BEARER_TOKEN";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub bearer_token: String,
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Build from `REVIEWSYNC_BASE_URL` / `REVIEWSYNC_BEARER_TOKEN`.
    pub fn from_env() -> SyncResult<Self> {
        let base_url =
            std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let bearer_token = std::env::var(ENV_BEARER_TOKEN).map_err(|_| {
            SyncError::Configuration(format!("{ENV_BEARER_TOKEN} is not set"))
        })?;
        Ok(Self::new(base_url, bearer_token))
    }
}

/// Bearer-authenticated HTTP client for all three review data sources.
#[derive(Debug, Clone)]
pub struct HttpReviewTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
}

impl HttpReviewTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn review_url(&self, review_id: &ReviewId, suffix: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/api/reviews/{}{suffix}", review_id.as_str())
    }

    async fn get(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self.client.get(url).bearer_auth(&self.config.bearer_token);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        request.send().await
    }
}

/// Map an HTTP rejection into the taxonomy: 401/403 is the fatal auth
/// class regardless of which boundary call produced it.
async fn rejection(response: reqwest::Response, wrap: fn(String) -> SyncError) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        SyncError::Auth(format!("status {status}: {body}"))
    } else {
        wrap(format!("status {status}: {body}"))
    }
}

#[async_trait]
impl SnapshotSource for HttpReviewTransport {
    async fn fetch_snapshot(&self, review_id: &ReviewId) -> SyncResult<ReviewSnapshot> {
        let url = self.review_url(review_id, "");
        let response = self
            .get(&url, None)
            .await
            .map_err(|error| SyncError::Snapshot(error.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(response, SyncError::Snapshot).await);
        }
        response
            .json::<ReviewSnapshot>()
            .await
            .map_err(|error| SyncError::Snapshot(format!("invalid snapshot body: {error}")))
    }
}

#[async_trait]
impl StatusSource for HttpReviewTransport {
    async fn poll_status(&self, review_id: &ReviewId) -> SyncResult<AnalysisStatus> {
        let url = self.review_url(review_id, "/status");
        let response = self
            .get(&url, None)
            .await
            .map_err(|error| SyncError::Poll(error.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(response, SyncError::Poll).await);
        }
        response
            .json::<AnalysisStatus>()
            .await
            .map_err(|error| SyncError::Poll(format!("invalid status body: {error}")))
    }
}

#[async_trait]
impl LiveChannelSource for HttpReviewTransport {
    async fn open_channel(&self, review_id: &ReviewId) -> SyncResult<LiveEventStream> {
        let url = self.review_url(review_id, "/stream");
        let response = self
            .get(&url, Some("text/event-stream"))
            .await
            .map_err(|error| SyncError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(response, SyncError::Transport).await);
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(SseSubscription {
            bytes,
            decoder: SseFrameDecoder::default(),
            ready: VecDeque::new(),
            closed: false,
        }))
    }
}

/// Live subscription over one SSE response body.
///
/// Malformed frames are logged and dropped here so the engine only ever
/// sees well-typed events or a channel failure.
struct SseSubscription {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseFrameDecoder,
    ready: VecDeque<String>,
    closed: bool,
}

impl SseSubscription {
    fn next_ready_event(&mut self) -> Option<LiveEvent> {
        while let Some(payload) = self.ready.pop_front() {
            match parse_event_frame(&payload) {
                Ok(event) => return Some(event),
                Err(error) => {
                    tracing::warn!(error = %error, "dropping malformed live event frame");
                }
            }
        }
        None
    }
}

#[async_trait]
impl LiveEventSubscription for SseSubscription {
    async fn next_event(&mut self) -> SyncResult<Option<LiveEvent>> {
        loop {
            if let Some(event) = self.next_ready_event() {
                return Ok(Some(event));
            }
            if self.closed {
                return Ok(None);
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    self.ready.extend(self.decoder.push_chunk(&chunk));
                }
                Some(Err(error)) => {
                    self.closed = true;
                    return Err(SyncError::Transport(format!("stream read failed: {error}")));
                }
                None => {
                    self.closed = true;
                    if let Some(payload) = self.decoder.finish() {
                        self.ready.push_back(payload);
                    }
                }
            }
        }
    }
}
