use std::collections::{HashMap, HashSet};

use reviewsync_protocol::ids::CellKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl CellStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Current extraction state of one cell.
///
/// `timestamp` is event-origin time in epoch milliseconds, not receipt
/// time; it drives the last-writer-wins merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub value: Option<String>,
    pub confidence_score: Option<f64>,
    pub source_reference: Option<String>,
    pub status: CellStatus,
    pub timestamp: i64,
}

impl CellState {
    fn pending() -> Self {
        Self {
            value: None,
            confidence_score: None,
            source_reference: None,
            status: CellStatus::Pending,
            timestamp: 0,
        }
    }
}

/// Authoritative map from cell identity to extraction state.
///
/// All writes go through the operations below; arrival order across the
/// snapshot, the live channel, and the poll backfill is not guaranteed, so
/// `apply_result` enforces monotonic timestamps per key and discards stale
/// updates.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<CellKey, CellState>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CellKey) -> Option<&CellState> {
        self.cells.get(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &CellState)> {
        self.cells.iter()
    }

    /// Insert a `pending` entry for every key that has none.
    ///
    /// Idempotent; never touches an existing entry.
    pub fn seed_pending(&mut self, keys: impl IntoIterator<Item = CellKey>) -> usize {
        let mut inserted = 0;
        for key in keys {
            self.cells.entry(key).or_insert_with(|| {
                inserted += 1;
                CellState::pending()
            });
        }
        inserted
    }

    /// Record that the backend started extracting this cell.
    ///
    /// Does not clobber a terminal state already recorded from a newer
    /// event; a processing marker arriving after the result is a no-op.
    pub fn mark_processing(&mut self, key: CellKey, timestamp: i64) -> bool {
        match self.cells.get(&key) {
            Some(existing) if existing.status.is_terminal() => false,
            _ => {
                self.cells.insert(
                    key,
                    CellState {
                        value: None,
                        confidence_score: None,
                        source_reference: None,
                        status: CellStatus::Processing,
                        timestamp,
                    },
                );
                true
            }
        }
    }

    /// Canonical write path for live and snapshot data.
    ///
    /// Accepts the write if the key has no entry or the incoming
    /// event-origin timestamp is not older than the stored one; otherwise
    /// the update is stale (out-of-order delivery) and is discarded.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_result(
        &mut self,
        key: CellKey,
        value: Option<String>,
        confidence_score: Option<f64>,
        source_reference: Option<String>,
        status: CellStatus,
        timestamp: i64,
    ) -> bool {
        if let Some(existing) = self.cells.get(&key) {
            if timestamp < existing.timestamp {
                return false;
            }
        }
        self.cells.insert(
            key,
            CellState {
                value,
                confidence_score,
                source_reference,
                status,
                timestamp,
            },
        );
        true
    }

    /// Demote every `processing` cell back to `pending`.
    ///
    /// Used when the review reaches a terminal state without a final
    /// per-cell event for every cell, so no spinner is left stuck.
    pub fn clear_all_processing(&mut self) -> usize {
        let mut cleared = 0;
        for state in self.cells.values_mut() {
            if state.status == CellStatus::Processing {
                state.status = CellStatus::Pending;
                cleared += 1;
            }
        }
        cleared
    }

    /// Drop entries for cells the review no longer declares.
    ///
    /// Applied after a snapshot refresh so a deleted column or file does
    /// not leave phantom cells behind.
    pub fn retain_keys(&mut self, declared: &HashSet<CellKey>) -> usize {
        let before = self.cells.len();
        self.cells.retain(|key, _| declared.contains(key));
        before - self.cells.len()
    }

    /// Drop every entry; called when the subscribed review changes.
    pub fn reset(&mut self) {
        self.cells.clear();
    }
}
