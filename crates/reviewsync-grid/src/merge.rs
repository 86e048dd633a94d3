use reviewsync_protocol::ids::CellKey;

use crate::store::{CellState, CellStatus, CellStore};

/// What the UI renders for one cell, resolved at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct CellDisplay {
    pub state: CellState,
    /// Transient highlight: the cell changed within the configured window.
    pub recently_updated: bool,
}

/// Read-time reconciliation of a cell.
///
/// The store already enforces monotonic last-writer-wins on write, so this
/// only maps status to visibility: `processing`, `completed` and `error`
/// entries are shown; `pending` entries and absent keys render empty.
pub fn display_cell(
    store: &CellStore,
    key: &CellKey,
    now_millis: i64,
    recent_window_millis: i64,
) -> Option<CellDisplay> {
    let state = store.get(key)?;
    match state.status {
        CellStatus::Pending => None,
        CellStatus::Processing | CellStatus::Completed | CellStatus::Error => Some(CellDisplay {
            recently_updated: now_millis.saturating_sub(state.timestamp) < recent_window_millis,
            state: state.clone(),
        }),
    }
}
