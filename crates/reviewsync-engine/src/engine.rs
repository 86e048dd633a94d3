use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use reviewsync_grid::{
    compute_stats, display_cell, seed_processing_placeholders, CellDisplay, CellStatus, CellStore,
    GridStats,
};
use reviewsync_protocol::event::timestamp_millis;
use reviewsync_protocol::ids::{CellKey, ReviewId};
use reviewsync_protocol::snapshot::{ReviewSnapshot, ReviewStatus};
use reviewsync_protocol::{LiveEvent, SyncError, SyncResult};
use reviewsync_transport::{LiveChannelSource, LiveEventStream, SnapshotSource, StatusSource};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::connection::ConnectionState;
use crate::notify::EngineNotification;

/// Follow-up work an event handler requests once the state lock is
/// released.
enum EventAction {
    None,
    RefreshSnapshot,
}

#[derive(Debug, Default)]
struct EngineInner {
    /// Bumped on every subscribe/unsubscribe; background tasks carry the
    /// epoch they were spawned under and drop their writes once it moves
    /// on, so a late callback for a previous review is a no-op.
    epoch: u64,
    review_id: Option<ReviewId>,
    store: CellStore,
    total_files: usize,
    total_columns: usize,
    review_status: Option<ReviewStatus>,
    created_at_millis: Option<i64>,
    progress_percentage: f64,
    connection: ConnectionState,
}

impl EngineInner {
    fn total_cells(&self) -> usize {
        self.total_files * self.total_columns
    }
}

struct Shared {
    config: EngineConfig,
    snapshots: Arc<dyn SnapshotSource>,
    statuses: Arc<dyn StatusSource>,
    channels: Arc<dyn LiveChannelSource>,
    inner: Mutex<EngineInner>,
    notifications: broadcast::Sender<EngineNotification>,
}

/// Real-time synchronization engine for one review grid.
///
/// Owns the cell store, the connection state machine, and the background
/// tasks feeding them. Exactly one review is subscribed at a time;
/// `subscribe` tears down any previous subscription first, and all store
/// mutations run behind one lock so the three data sources never
/// interleave mid-update.
pub struct ReviewSyncEngine {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ReviewSyncEngine {
    pub fn new(
        config: EngineConfig,
        snapshots: Arc<dyn SnapshotSource>,
        statuses: Arc<dyn StatusSource>,
        channels: Arc<dyn LiveChannelSource>,
    ) -> Self {
        let (notifications, _receiver) = broadcast::channel(config.notification_buffer.max(1));
        Self {
            shared: Arc::new(Shared {
                config,
                snapshots,
                statuses,
                channels,
                inner: Mutex::new(EngineInner::default()),
                notifications,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register for change notifications. Safe to call before
    /// `subscribe`; the receiver survives review switches.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<EngineNotification> {
        self.shared.notifications.subscribe()
    }

    /// Open a subscription for `review_id`: load the snapshot, seed the
    /// store, then bring up the live channel with a polling fallback.
    ///
    /// A snapshot failure is returned to the caller as a retryable error;
    /// the engine does not retry it on its own.
    pub async fn subscribe(&self, review_id: ReviewId) -> SyncResult<()> {
        self.unsubscribe();

        let epoch = {
            let mut inner = self.shared.lock_inner();
            inner.epoch += 1;
            inner.review_id = Some(review_id.clone());
            inner.connection = ConnectionState::Connecting;
            inner.epoch
        };
        self.shared
            .notify(EngineNotification::ConnectionChanged(ConnectionState::Connecting));

        let snapshot = match self.shared.snapshots.fetch_snapshot(&review_id).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let still_current = {
                    let mut inner = self.shared.lock_inner();
                    if inner.epoch == epoch {
                        inner.connection = ConnectionState::Idle;
                        inner.review_id = None;
                        true
                    } else {
                        false
                    }
                };
                if still_current {
                    self.shared
                        .notify(EngineNotification::ConnectionChanged(ConnectionState::Idle));
                }
                return Err(error);
            }
        };
        self.shared.apply_snapshot(epoch, &snapshot);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run_connection(shared, review_id, epoch));
        self.tasks
            .lock()
            .expect("engine task lock poisoned")
            .push(handle);
        Ok(())
    }

    /// Tear down the current subscription: abort the transport tasks,
    /// reset the store, and return to `idle`. Idempotent.
    pub fn unsubscribe(&self) {
        let handles = {
            let mut tasks = self.tasks.lock().expect("engine task lock poisoned");
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            handle.abort();
        }

        let was_active = {
            let mut inner = self.shared.lock_inner();
            let was_active = inner.review_id.is_some();
            let next_epoch = inner.epoch + 1;
            *inner = EngineInner {
                epoch: next_epoch,
                ..EngineInner::default()
            };
            was_active
        };
        if was_active {
            self.shared
                .notify(EngineNotification::ConnectionChanged(ConnectionState::Idle));
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock_inner().connection
    }

    pub fn review_status(&self) -> Option<ReviewStatus> {
        self.shared.lock_inner().review_status
    }

    pub fn progress_percentage(&self) -> f64 {
        self.shared.lock_inner().progress_percentage
    }

    /// Read-time reconciled view of one cell.
    pub fn cell(&self, key: &CellKey) -> Option<CellDisplay> {
        let inner = self.shared.lock_inner();
        display_cell(
            &inner.store,
            key,
            now_millis(),
            self.shared.config.recent_update_window_millis,
        )
    }

    /// Derived completion metrics over the full grid.
    pub fn stats(&self) -> GridStats {
        let inner = self.shared.lock_inner();
        compute_stats(&inner.store, inner.total_cells())
    }
}

impl Drop for ReviewSyncEngine {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for handle in tasks.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Shared {
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, EngineInner> {
        self.inner.lock().expect("engine state lock poisoned")
    }

    fn notify(&self, notification: EngineNotification) {
        let _ = self.notifications.send(notification);
    }

    /// Move the connection state, provided the subscription is still the
    /// one the caller was spawned under.
    fn set_connection(&self, epoch: u64, state: ConnectionState) -> bool {
        {
            let mut inner = self.lock_inner();
            if inner.epoch != epoch {
                return false;
            }
            if inner.connection == state {
                return true;
            }
            inner.connection = state;
        }
        tracing::debug!(state = ?state, "connection state changed");
        self.notify(EngineNotification::ConnectionChanged(state));
        true
    }

    /// Seed the store from a snapshot: persisted results first through the
    /// canonical write path, then pending placeholders for the remainder,
    /// then optimistic `processing` placeholders for a freshly started
    /// review. All three steps are idempotent, so re-applying a newer
    /// snapshot over live data is safe.
    fn apply_snapshot(&self, epoch: u64, snapshot: &ReviewSnapshot) -> bool {
        let now = now_millis();
        let (status, progress) = {
            let mut inner = self.lock_inner();
            if inner.epoch != epoch {
                return false;
            }
            inner.total_files = snapshot.files.len();
            inner.total_columns = snapshot.columns.len();
            inner.review_status = Some(snapshot.status);
            inner.created_at_millis = snapshot.created_at_millis();

            for result in &snapshot.results {
                inner.store.apply_result(
                    result.cell_key(),
                    result.extracted_value.clone(),
                    result.confidence_score,
                    result.source_reference.clone(),
                    CellStatus::Completed,
                    result.created_at_millis().unwrap_or(0),
                );
            }
            let keys: Vec<CellKey> = snapshot.cell_keys().collect();
            inner.store.seed_pending(keys.clone());
            let created_at_millis = inner.created_at_millis;
            seed_processing_placeholders(
                &mut inner.store,
                keys.clone(),
                snapshot.status,
                created_at_millis,
                now,
                self.config.optimistic_seed_window.as_millis() as i64,
            );
            // The snapshot declares the full grid; anything else is a
            // leftover from a deleted column or file.
            let declared: HashSet<CellKey> = keys.into_iter().collect();
            inner.store.retain_keys(&declared);

            let stats = compute_stats(&inner.store, inner.total_cells());
            inner.progress_percentage = f64::from(stats.completion_percentage);
            (snapshot.status, inner.progress_percentage)
        };
        self.notify(EngineNotification::StructureChanged);
        self.notify(EngineNotification::StatusChanged {
            status,
            progress_percentage: progress,
        });
        true
    }

    async fn refresh_snapshot(&self, epoch: u64, review_id: &ReviewId) {
        match self.snapshots.fetch_snapshot(review_id).await {
            Ok(snapshot) => {
                self.apply_snapshot(epoch, &snapshot);
            }
            Err(error) if error.is_fatal() => {
                self.fail_fatally(epoch, error);
            }
            Err(error) => {
                tracing::warn!(error = %error, "snapshot refresh failed");
            }
        }
    }

    fn fail_fatally(&self, epoch: u64, error: SyncError) {
        self.set_connection(epoch, ConnectionState::Closed);
        self.notify(EngineNotification::Fatal(error));
    }

    /// Single dispatch point for every event, whether it came off the live
    /// channel or was synthesized from a poll transition.
    fn handle_event(&self, epoch: u64, event: &LiveEvent) -> EventAction {
        let now = now_millis();
        let mut notifications = Vec::new();
        let action = {
            let mut inner = self.lock_inner();
            if inner.epoch != epoch {
                return EventAction::None;
            }
            if let Some(review_id) = event.review_id() {
                if inner.review_id.as_ref() != Some(review_id) {
                    tracing::debug!(
                        review_id = review_id.as_str(),
                        "dropping event for a review that is not subscribed"
                    );
                    return EventAction::None;
                }
            }

            match event {
                LiveEvent::Heartbeat(_) => EventAction::None,
                LiveEvent::Connected(_) => {
                    // The server handshake can outrun the HTTP open
                    // completing; treat it as proof the channel is live.
                    if inner.connection.is_active()
                        && inner.connection != ConnectionState::Live
                    {
                        inner.connection = ConnectionState::Live;
                        notifications.push(EngineNotification::ConnectionChanged(
                            ConnectionState::Live,
                        ));
                    }
                    EventAction::None
                }
                LiveEvent::AnalysisStarted(_) => {
                    inner.review_status = Some(ReviewStatus::Processing);
                    notifications.push(EngineNotification::StatusChanged {
                        status: ReviewStatus::Processing,
                        progress_percentage: inner.progress_percentage,
                    });
                    EventAction::None
                }
                LiveEvent::CellProcessingStarted(started) => {
                    let key = CellKey::new(started.file_id.clone(), started.column_id.clone());
                    if inner.store.mark_processing(key.clone(), now) {
                        notifications.push(EngineNotification::CellChanged(key));
                    }
                    EventAction::None
                }
                LiveEvent::CellCompleted(completed) => {
                    let key = CellKey::new(completed.file_id.clone(), completed.column_id.clone());
                    let timestamp = completed
                        .timestamp
                        .as_deref()
                        .and_then(timestamp_millis)
                        .unwrap_or(now);
                    let applied = inner.store.apply_result(
                        key.clone(),
                        completed.result.extracted_value.clone(),
                        completed.result.confidence_score,
                        completed.result.source_reference.clone(),
                        CellStatus::Completed,
                        timestamp,
                    );
                    if applied {
                        notifications.push(EngineNotification::CellChanged(key));
                        // A stale-rejected event's progress figure is just
                        // as stale as its value.
                        if let Some(progress) = completed.progress {
                            if progress != inner.progress_percentage {
                                inner.progress_percentage = progress;
                                notifications.push(EngineNotification::StatusChanged {
                                    status: inner
                                        .review_status
                                        .unwrap_or(ReviewStatus::Processing),
                                    progress_percentage: progress,
                                });
                            }
                        }
                    }
                    EventAction::None
                }
                LiveEvent::CellError(errored) => {
                    let key = CellKey::new(errored.file_id.clone(), errored.column_id.clone());
                    let timestamp = errored
                        .timestamp
                        .as_deref()
                        .and_then(timestamp_millis)
                        .unwrap_or(now);
                    let applied = inner.store.apply_result(
                        key.clone(),
                        None,
                        None,
                        Some(errored.error.clone()),
                        CellStatus::Error,
                        timestamp,
                    );
                    if applied {
                        notifications.push(EngineNotification::CellChanged(key));
                    }
                    EventAction::None
                }
                LiveEvent::AnalysisCompleted(completed) => {
                    inner.store.clear_all_processing();
                    inner.review_status = Some(ReviewStatus::Completed);
                    inner.progress_percentage = completed.progress.unwrap_or(100.0);
                    notifications.push(EngineNotification::StructureChanged);
                    notifications.push(EngineNotification::StatusChanged {
                        status: ReviewStatus::Completed,
                        progress_percentage: inner.progress_percentage,
                    });
                    EventAction::None
                }
                LiveEvent::AnalysisFailed(failed) => {
                    inner.store.clear_all_processing();
                    inner.review_status = Some(ReviewStatus::Error);
                    if let Some(error) = &failed.error {
                        tracing::warn!(error = %error, "analysis failed");
                    }
                    notifications.push(EngineNotification::StructureChanged);
                    notifications.push(EngineNotification::StatusChanged {
                        status: ReviewStatus::Error,
                        progress_percentage: inner.progress_percentage,
                    });
                    EventAction::None
                }
                // Batch-start announcements; the per-cell events that
                // follow carry the actual state changes.
                LiveEvent::FilesAnalysisStarted(_) | LiveEvent::ColumnAnalysisStarted(_) => {
                    EventAction::None
                }
                // A failed batch never sends final events for its cells;
                // demote their markers so nothing spins forever.
                LiveEvent::FilesAnalysisFailed(_) | LiveEvent::ColumnAnalysisFailed(_) => {
                    if inner.store.clear_all_processing() > 0 {
                        notifications.push(EngineNotification::StructureChanged);
                    }
                    EventAction::None
                }
                // These frames carry no data; the snapshot is the source
                // of truth for the new structure or edited result.
                LiveEvent::ColumnAdded(_)
                | LiveEvent::ColumnUpdated(_)
                | LiveEvent::ColumnDeleted(_)
                | LiveEvent::FilesAdded(_)
                | LiveEvent::ResultUpdated(_)
                | LiveEvent::FilesAnalysisCompleted(_)
                | LiveEvent::ColumnAnalysisCompleted(_) => EventAction::RefreshSnapshot,
            }
        };
        for notification in notifications {
            self.notify(notification);
        }
        action
    }
}

/// Connection task: bring up the push channel inside the connect timeout,
/// otherwise degrade to interval polling. Spawned once per subscription
/// and aborted by `unsubscribe`.
async fn run_connection(shared: Arc<Shared>, review_id: ReviewId, epoch: u64) {
    let open = tokio::time::timeout(
        shared.config.connect_timeout,
        shared.channels.open_channel(&review_id),
    )
    .await;

    match open {
        Ok(Ok(stream)) => {
            if !shared.set_connection(epoch, ConnectionState::Live) {
                return;
            }
            run_live_loop(&shared, &review_id, epoch, stream).await;
        }
        Ok(Err(error)) if error.is_fatal() => {
            shared.fail_fatally(epoch, error);
        }
        Ok(Err(error)) => {
            tracing::warn!(error = %error, "live channel failed to open, degrading to polling");
            run_poll_loop(&shared, &review_id, epoch).await;
        }
        Err(_elapsed) => {
            tracing::warn!("live channel connect timed out, degrading to polling");
            run_poll_loop(&shared, &review_id, epoch).await;
        }
    }
}

async fn run_live_loop(
    shared: &Arc<Shared>,
    review_id: &ReviewId,
    epoch: u64,
    mut stream: LiveEventStream,
) {
    loop {
        match stream.next_event().await {
            Ok(Some(event)) => {
                if let EventAction::RefreshSnapshot = shared.handle_event(epoch, &event) {
                    shared.refresh_snapshot(epoch, review_id).await;
                }
            }
            Ok(None) => {
                tracing::debug!("live channel closed");
                break;
            }
            Err(error) if error.is_fatal() => {
                shared.fail_fatally(epoch, error);
                return;
            }
            Err(error) => {
                tracing::warn!(error = %error, "live channel failed");
                break;
            }
        }
    }

    let review_finished = {
        let inner = shared.lock_inner();
        inner.epoch == epoch && inner.review_status.is_some_and(ReviewStatus::is_terminal)
    };
    if review_finished {
        shared.set_connection(epoch, ConnectionState::Closed);
    } else {
        run_poll_loop(shared, review_id, epoch).await;
    }
}

/// Polling fallback: fixed-interval status reads until the review reaches
/// a terminal state, then one final snapshot re-fetch backfills the
/// per-cell values the push channel never delivered.
async fn run_poll_loop(shared: &Arc<Shared>, review_id: &ReviewId, epoch: u64) {
    if !shared.set_connection(epoch, ConnectionState::DegradedPolling) {
        return;
    }

    let mut ticker = tokio::time::interval(shared.config.poll_interval);
    loop {
        ticker.tick().await;
        if shared.lock_inner().epoch != epoch {
            return;
        }

        match shared.statuses.poll_status(review_id).await {
            Ok(status) => {
                {
                    let mut inner = shared.lock_inner();
                    if inner.epoch != epoch {
                        return;
                    }
                    inner.review_status = Some(status.status);
                    inner.progress_percentage = status.progress_percentage;
                }
                shared.notify(EngineNotification::StatusChanged {
                    status: status.status,
                    progress_percentage: status.progress_percentage,
                });

                if status.status.is_terminal() {
                    shared.refresh_snapshot(epoch, review_id).await;
                    {
                        let mut inner = shared.lock_inner();
                        if inner.epoch != epoch {
                            return;
                        }
                        inner.store.clear_all_processing();
                    }
                    shared.set_connection(epoch, ConnectionState::Closed);
                    return;
                }
            }
            Err(error) if error.is_fatal() => {
                shared.fail_fatally(epoch, error);
                return;
            }
            Err(error) => {
                // No backoff: the next scheduled tick retries.
                tracing::warn!(error = %error, "status poll failed");
            }
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
