use reviewsync_protocol::ids::CellKey;
use reviewsync_protocol::snapshot::ReviewStatus;
use reviewsync_protocol::SyncError;

use crate::connection::ConnectionState;

/// Change notifications fanned out to consumers on every store mutation.
///
/// Consumers re-read the derived views (`cell`, `stats`) after a
/// notification; the notification itself carries only what changed.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    ConnectionChanged(ConnectionState),
    CellChanged(CellKey),
    StructureChanged,
    StatusChanged {
        status: ReviewStatus,
        progress_percentage: f64,
    },
    /// Unrecoverable failure (auth rejection); the caller must
    /// re-authenticate and resubscribe.
    Fatal(SyncError),
}
