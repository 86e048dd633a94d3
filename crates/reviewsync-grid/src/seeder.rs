use reviewsync_protocol::ids::CellKey;
use reviewsync_protocol::snapshot::ReviewStatus;

use crate::store::CellStore;

/// Pre-populate `processing` placeholders for cells with no data yet.
///
/// Bridges the gap between review creation and the backend's first emitted
/// per-cell event: a review that is `processing` and was created within
/// `seed_window_millis` of `now_millis` gets a synthetic placeholder for
/// every absent key. Only absent entries are filled, so this can never
/// overwrite a real result or a real processing marker regardless of what
/// the live channel delivers concurrently.
///
/// Cells appearing after the window has passed render empty until their own
/// event or the next snapshot refresh arrives; that gap is an accepted
/// approximation, and the window stays configurable for that reason.
pub fn seed_processing_placeholders(
    store: &mut CellStore,
    keys: impl IntoIterator<Item = CellKey>,
    review_status: ReviewStatus,
    created_at_millis: Option<i64>,
    now_millis: i64,
    seed_window_millis: i64,
) -> usize {
    if review_status != ReviewStatus::Processing {
        return 0;
    }
    let Some(created_at) = created_at_millis else {
        return 0;
    };
    if now_millis.saturating_sub(created_at) > seed_window_millis {
        return 0;
    }

    let mut seeded = 0;
    for key in keys {
        if store.get(&key).is_none() && store.mark_processing(key, now_millis) {
            seeded += 1;
        }
    }
    seeded
}
