//! Subscription lifecycle and reconciliation engine for one review grid.
//!
//! Couples the transport seams to the in-memory cell store: snapshot load,
//! live event application, degraded polling, and change notifications, all
//! behind a single `ReviewSyncEngine` handle.

pub mod config;
pub mod connection;
pub mod engine;
pub mod notify;

pub use config::EngineConfig;
pub use connection::ConnectionState;
pub use engine::ReviewSyncEngine;
pub use notify::EngineNotification;
