use thiserror::Error;

/// Error taxonomy shared across the synchronization boundary.
///
/// `Auth` is fatal to the session and propagated past the engine;
/// `Transport` and `Poll` degrade or retry instead of surfacing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("snapshot fetch failed: {0}")]
    Snapshot(String),
    #[error("live channel failed: {0}")]
    Transport(String),
    #[error("status poll failed: {0}")]
    Poll(String),
    #[error("malformed event payload: {0}")]
    MalformedEvent(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Auth rejections cannot be recovered by falling back to polling.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
