//! Shared wire protocol for the review grid synchronization engine.
//!
//! Defines the identifiers, the closed live-event union, the snapshot and
//! status wire shapes, and the error taxonomy shared by the grid store,
//! the transports, and the engine.

pub mod error;
pub mod event;
pub mod ids;
pub mod snapshot;

pub use error::{SyncError, SyncResult};
pub use event::LiveEvent;
pub use ids::{CellKey, ColumnId, FileId, ReviewId};
pub use snapshot::{AnalysisStatus, ReviewSnapshot, ReviewStatus};
