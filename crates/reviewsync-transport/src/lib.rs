//! Transport seams for the three data sources the engine reconciles:
//! the one-shot snapshot fetch, the status poll, and the push-based live
//! channel, plus the bearer-authenticated HTTP/SSE implementations.

pub mod http;
mod sse;

use async_trait::async_trait;
use reviewsync_protocol::ids::ReviewId;
use reviewsync_protocol::snapshot::{AnalysisStatus, ReviewSnapshot};
use reviewsync_protocol::{LiveEvent, SyncResult};

pub use http::{HttpReviewTransport, HttpTransportConfig};

/// One-shot structural + results read.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, review_id: &ReviewId) -> SyncResult<ReviewSnapshot>;
}

/// Interval status read used while the push channel is unavailable.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn poll_status(&self, review_id: &ReviewId) -> SyncResult<AnalysisStatus>;
}

/// An open per-review event subscription.
///
/// `Ok(None)` means the channel closed cleanly; an error means it failed
/// and the caller should fall back to polling.
#[async_trait]
pub trait LiveEventSubscription: Send {
    async fn next_event(&mut self) -> SyncResult<Option<LiveEvent>>;
}

pub type LiveEventStream = Box<dyn LiveEventSubscription>;

/// Factory for per-review push subscriptions.
#[async_trait]
pub trait LiveChannelSource: Send + Sync {
    async fn open_channel(&self, review_id: &ReviewId) -> SyncResult<LiveEventStream>;
}
