//! In-memory cell grid: authoritative store, read-time merge view,
//! optimistic seeding, and derived progress stats.
//!
//! Everything here is synchronous; the engine crate serializes mutations
//! behind its own lock, so the store needs no interior locking.

pub mod merge;
pub mod seeder;
pub mod stats;
pub mod store;

pub use merge::{display_cell, CellDisplay};
pub use seeder::seed_processing_placeholders;
pub use stats::{compute_stats, GridStats};
pub use store::{CellState, CellStatus, CellStore};
