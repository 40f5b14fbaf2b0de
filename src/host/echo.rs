//! Local stand-in for the hosting application.
//!
//! The standalone binary has no real review queue behind it, so this host
//! keeps a tiny simulated one: a remaining-card counter, a revealed flag,
//! and a log line per action. Every queue mutation is echoed as the
//! matching [`AppEvent`] so the statistics worker sees the same lifecycle
//! stream the real host would deliver.

use crate::host::{AppEvent, QueueHost, ScoreCode, ScreenKind, ScrollDirection};
use chrono::Local;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct EchoInner {
    revealed: AtomicBool,
    remaining: AtomicU32,
    events: mpsc::Sender<AppEvent>,
}

/// Echoing [`QueueHost`] implementation.
#[derive(Debug, Clone)]
pub struct EchoHost {
    inner: Arc<EchoInner>,
}

impl EchoHost {
    pub fn new(remaining: u32, events: mpsc::Sender<AppEvent>) -> Self {
        Self {
            inner: Arc::new(EchoInner {
                revealed: AtomicBool::new(false),
                remaining: AtomicU32::new(remaining),
                events,
            }),
        }
    }

    async fn emit(&self, event: AppEvent) {
        if self.inner.events.send(event).await.is_err() {
            debug!("Event receiver gone, dropping lifecycle event");
        }
    }

    /// Starts a simulated review session.
    pub async fn enter_queue(&self) {
        info!(
            "Entering queue with {} cards",
            self.inner.remaining.load(Ordering::SeqCst)
        );
        self.inner.revealed.store(false, Ordering::SeqCst);
        self.emit(AppEvent::QueueEnter {
            timestamp: Local::now(),
        })
        .await;
    }
}

impl QueueHost for EchoHost {
    async fn reveal_answer(&self) {
        info!("Revealing answer");
        self.inner.revealed.store(true, Ordering::SeqCst);
        self.emit(AppEvent::AnswerRevealed {
            timestamp: Local::now(),
        })
        .await;
    }

    async fn rate_current_card(&self, score: ScoreCode) {
        info!("Card rated: {:?}", score);
        self.inner.revealed.store(false, Ordering::SeqCst);
        let remaining = self.inner.remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.inner.remaining.store(remaining - 1, Ordering::SeqCst);
        }
        self.emit(AppEvent::CardCompleted {
            score,
            timestamp: Local::now(),
        })
        .await;
        self.emit(AppEvent::CardLoaded {
            timestamp: Local::now(),
        })
        .await;
    }

    async fn go_back_to_previous_card(&self) {
        info!("Going back to previous card");
        self.inner.revealed.store(false, Ordering::SeqCst);
    }

    async fn scroll(&self, direction: ScrollDirection) {
        debug!("Scroll {:?}", direction);
    }

    async fn remaining_cards(&self) -> Option<u32> {
        Some(self.inner.remaining.load(Ordering::SeqCst))
    }

    async fn current_screen(&self) -> Option<ScreenKind> {
        Some(ScreenKind::Card)
    }

    async fn in_lookback_mode(&self) -> bool {
        false
    }

    async fn has_revealed_answer(&self) -> bool {
        self.inner.revealed.load(Ordering::SeqCst)
    }

    async fn notify(&self, message: &str) {
        warn!("Notice: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rating_completes_a_card_and_loads_the_next() {
        let (tx, mut rx) = mpsc::channel(16);
        let host = EchoHost::new(3, tx);

        host.enter_queue().await;
        host.reveal_answer().await;
        assert!(host.has_revealed_answer().await);
        host.rate_current_card(ScoreCode::Good).await;

        assert!(!host.has_revealed_answer().await);
        assert_eq!(host.remaining_cards().await, Some(2));

        assert!(matches!(rx.recv().await, Some(AppEvent::QueueEnter { .. })));
        assert!(matches!(rx.recv().await, Some(AppEvent::AnswerRevealed { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(AppEvent::CardCompleted {
                score: ScoreCode::Good,
                ..
            })
        ));
        assert!(matches!(rx.recv().await, Some(AppEvent::CardLoaded { .. })));
    }

    #[tokio::test]
    async fn remaining_count_never_underflows() {
        let (tx, _rx) = mpsc::channel(16);
        let host = EchoHost::new(0, tx);
        host.rate_current_card(ScoreCode::Again).await;
        assert_eq!(host.remaining_cards().await, Some(0));
    }
}
