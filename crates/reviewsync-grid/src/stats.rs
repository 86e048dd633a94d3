use serde::{Deserialize, Serialize};

use crate::store::{CellStatus, CellStore};

/// Derived completion metrics over the full grid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridStats {
    pub completed: usize,
    pub processing: usize,
    pub error: usize,
    pub pending: usize,
    pub avg_confidence: f64,
    pub completion_percentage: u8,
}

/// Pure aggregation over the store plus the known grid size.
///
/// Cells the store has never seen count as `pending`: they render the same
/// as seeded pending entries. `completion_percentage` is clamped to
/// `[0, 100]` and reads 100 only when every cell is completed, so a rounded
/// 99.6% does not show a finished grid.
pub fn compute_stats(store: &CellStore, total_cells: usize) -> GridStats {
    let mut stats = GridStats::default();
    let mut confidence_sum = 0.0;
    let mut confidence_count = 0usize;

    for (_, state) in store.iter() {
        match state.status {
            CellStatus::Completed => {
                stats.completed += 1;
                if let Some(confidence) = state.confidence_score {
                    if confidence > 0.0 {
                        confidence_sum += confidence;
                        confidence_count += 1;
                    }
                }
            }
            CellStatus::Processing => stats.processing += 1,
            CellStatus::Error => stats.error += 1,
            CellStatus::Pending => stats.pending += 1,
        }
    }
    stats.pending += total_cells.saturating_sub(store.len());

    if confidence_count > 0 {
        stats.avg_confidence = confidence_sum / confidence_count as f64;
    }

    stats.completion_percentage = if total_cells == 0 {
        0
    } else if stats.completed >= total_cells {
        100
    } else {
        let rounded = (stats.completed as f64 / total_cells as f64 * 100.0).round() as i64;
        rounded.clamp(0, 99) as u8
    };

    stats
}
