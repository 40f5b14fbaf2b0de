//! Statistics worker task.
//!
//! Owns a [`StatsEstimator`], feeds it the host's lifecycle events, and
//! publishes each derived snapshot two ways: a watch channel for in-process
//! consumers and a set of session-storage keys that display widgets read.
//! Storage failures are logged and skipped; the watch channel stays
//! authoritative for that session.

use crate::host::{AppEvent, QueueHost, Storage, StorageScope};
use crate::stats::{StatsEstimator, StatsSnapshot, UNBOUNDED};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const KEY_CARD_PER_MINUTE: &str = "queueStats_cardPerMinute";
const KEY_REMAINING_TIME: &str = "queueStats_remainingTime";
const KEY_TOTAL_CARDS_COMPLETED: &str = "queueStats_totalCardsCompleted";
const KEY_TOTAL_TIME_SPENT: &str = "queueStats_totalTimeSpent";
const KEY_TOTAL_AGAIN_COUNT: &str = "queueStats_totalAgainCount";
const KEY_EXPECTED_COMPLETION: &str = "queueStats_expectedCompletionTime";

/// Public handle to the statistics worker.
///
/// The worker stops once the event sender is dropped; there is no
/// dedicated cancellation path.
pub struct StatsHandle {
    snapshot_receiver: watch::Receiver<StatsSnapshot>,
    task: JoinHandle<()>,
}

impl StatsHandle {
    pub fn spawn<Q: QueueHost, S: Storage>(
        mut events: mpsc::Receiver<AppEvent>,
        queue: Arc<Q>,
        storage: Arc<S>,
    ) -> Self {
        info!("Spawning statistics worker");
        let (snapshot_sender, snapshot_receiver) = watch::channel(StatsSnapshot::default());

        let task = tokio::spawn(async move {
            let mut estimator = StatsEstimator::new();

            while let Some(event) = events.recv().await {
                match event {
                    AppEvent::QueueEnter { timestamp } => {
                        estimator.on_queue_enter(timestamp);
                        let snapshot = StatsSnapshot::default();
                        mirror_to_storage(storage.as_ref(), &snapshot).await;
                        let _ = snapshot_sender.send(snapshot);
                    }
                    AppEvent::AnswerRevealed { timestamp } => {
                        if estimator.on_reveal(timestamp).is_none() {
                            debug!("Reveal outside a session ignored");
                        }
                    }
                    AppEvent::CardCompleted { score, timestamp } => {
                        let remaining = queue.remaining_cards().await;
                        match estimator.on_complete(timestamp, score, remaining) {
                            Some(snapshot) => {
                                info!(
                                    "Card completed: {} done, {:.2} cpm, {} remaining time",
                                    snapshot.total_cards_completed,
                                    snapshot.success_cpm,
                                    snapshot.remaining_display
                                );
                                mirror_to_storage(storage.as_ref(), &snapshot).await;
                                let _ = snapshot_sender.send(snapshot);
                            }
                            None => debug!("Completion outside a session ignored"),
                        }
                    }
                    AppEvent::CardLoaded { .. } => {
                        debug!("Card loaded");
                    }
                }
            }
            info!("Statistics worker finished, event stream closed");
        });

        Self {
            snapshot_receiver,
            task,
        }
    }

    /// Receiver for the latest published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot_receiver.clone()
    }

    /// Waits for the worker to drain; callers drop the event sender first.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Statistics worker panicked: {}", e);
        }
    }
}

/// Writes the snapshot into the session-scope keys display widgets read.
async fn mirror_to_storage<S: Storage>(storage: &S, snapshot: &StatsSnapshot) {
    let entries = [
        (KEY_CARD_PER_MINUTE, snapshot.success_cpm.to_string()),
        (KEY_REMAINING_TIME, snapshot.remaining_display.clone()),
        (
            KEY_TOTAL_CARDS_COMPLETED,
            snapshot.total_cards_completed.to_string(),
        ),
        (
            KEY_TOTAL_TIME_SPENT,
            snapshot.total_time_spent_minutes.to_string(),
        ),
        (KEY_TOTAL_AGAIN_COUNT, snapshot.total_again_count.to_string()),
        (
            KEY_EXPECTED_COMPLETION,
            snapshot.expected_completion_display(),
        ),
    ];

    for (key, value) in entries {
        if let Err(e) = storage.set(StorageScope::Session, key, value).await {
            warn!("Failed to mirror {} to session storage: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryStorage, ScoreCode, ScreenKind, ScrollDirection};
    use chrono::{DateTime, Local, TimeZone};

    #[derive(Debug)]
    struct FixedQueue {
        remaining: Option<u32>,
    }

    impl QueueHost for FixedQueue {
        async fn reveal_answer(&self) {}
        async fn rate_current_card(&self, _score: ScoreCode) {}
        async fn go_back_to_previous_card(&self) {}
        async fn scroll(&self, _direction: ScrollDirection) {}
        async fn remaining_cards(&self) -> Option<u32> {
            self.remaining
        }
        async fn current_screen(&self) -> Option<ScreenKind> {
            Some(ScreenKind::Card)
        }
        async fn in_lookback_mode(&self) -> bool {
            false
        }
        async fn has_revealed_answer(&self) -> bool {
            false
        }
        async fn notify(&self, _message: &str) {}
    }

    fn at(seconds: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
    }

    #[tokio::test]
    async fn worker_publishes_and_mirrors_snapshots() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Arc::new(FixedQueue {
            remaining: Some(12),
        });
        let (tx, rx) = mpsc::channel(16);
        let handle = StatsHandle::spawn(rx, queue, Arc::clone(&storage));
        let mut snapshots = handle.subscribe();

        tx.send(AppEvent::QueueEnter { timestamp: at(0) })
            .await
            .expect("worker is alive");
        tx.send(AppEvent::AnswerRevealed { timestamp: at(10) })
            .await
            .expect("worker is alive");
        tx.send(AppEvent::CardCompleted {
            score: ScoreCode::Good,
            timestamp: at(10),
        })
        .await
        .expect("worker is alive");
        drop(tx);
        handle.join().await;

        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.success_cpm, 6.0);
        assert_eq!(snapshot.total_cards_completed, 1);
        assert_eq!(snapshot.remaining_display, "2m 0s");

        let cpm = storage
            .get(StorageScope::Session, KEY_CARD_PER_MINUTE)
            .await
            .expect("get");
        assert_eq!(cpm.as_deref(), Some("6"));
        let remaining = storage
            .get(StorageScope::Session, KEY_REMAINING_TIME)
            .await
            .expect("get");
        assert_eq!(remaining.as_deref(), Some("2m 0s"));
        let eta = storage
            .get(StorageScope::Session, KEY_EXPECTED_COMPLETION)
            .await
            .expect("get");
        assert!(eta.expect("key written").contains(':'));
    }

    #[tokio::test]
    async fn queue_enter_resets_the_published_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = Arc::new(FixedQueue { remaining: None });
        let (tx, rx) = mpsc::channel(16);
        let handle = StatsHandle::spawn(rx, queue, Arc::clone(&storage));
        let mut snapshots = handle.subscribe();

        tx.send(AppEvent::QueueEnter { timestamp: at(0) })
            .await
            .expect("worker is alive");
        tx.send(AppEvent::AnswerRevealed { timestamp: at(10) })
            .await
            .expect("worker is alive");
        tx.send(AppEvent::CardCompleted {
            score: ScoreCode::Again,
            timestamp: at(10),
        })
        .await
        .expect("worker is alive");
        tx.send(AppEvent::QueueEnter { timestamp: at(100) })
            .await
            .expect("worker is alive");
        drop(tx);
        handle.join().await;

        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot, StatsSnapshot::default());
        let count = storage
            .get(StorageScope::Session, KEY_TOTAL_CARDS_COMPLETED)
            .await
            .expect("get");
        assert_eq!(count.as_deref(), Some("0"));
    }
}
