//! Collaborator surface of the hosting application.
//!
//! The crate runs as a companion to a note-taking app's review queue and
//! never owns rendering, persistence, or queue logic itself. Everything it
//! needs from the host is modelled here as trait seams and message types:
//!
//! - [`storage`] - scoped key-value storage (synced / session)
//! - [`PluginMessage`] - fire-and-forget broadcasts between widget instances
//! - [`AppEvent`] - queue lifecycle events pushed by the host
//! - [`QueueHost`] - queue control and queries
//!
//! The standalone binary plugs a local echo implementation into these seams;
//! tests plug in recording fakes.

pub mod echo;
pub mod storage;

pub use echo::EchoHost;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, StorageScope};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Numeric outcome codes understood by the host when rating a card.
///
/// The host overloads these as score values; inside this crate actions stay
/// a closed enum ([`crate::mapping::ReviewAction`]) and only cross into
/// numeric codes at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ScoreCode {
    Again = 0,
    Hard = 1,
    Good = 2,
    Easy = 3,
    TooEarly = 4,
    ViewedAsLeech = 5,
    Reset = 6,
}

impl ScoreCode {
    /// The failure outcome, excluded from the "success" throughput metric.
    pub fn is_again(self) -> bool {
        matches!(self, ScoreCode::Again)
    }
}

/// Queue lifecycle events delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A review queue was entered; session statistics reset.
    QueueEnter { timestamp: DateTime<Local> },
    /// The answer of the current card was revealed.
    AnswerRevealed { timestamp: DateTime<Local> },
    /// The current card was rated and completed.
    CardCompleted {
        score: ScoreCode,
        timestamp: DateTime<Local>,
    },
    /// A new card (or slide) was loaded into the queue view.
    CardLoaded { timestamp: DateTime<Local> },
}

/// Fire-and-forget messages broadcast to all widget instances.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginMessage {
    /// A mapping table changed at some scope; observers must re-resolve.
    /// `scope_key` is the synced-storage key that was written, `None` for
    /// the legacy global table.
    MappingChanged { scope_key: Option<String> },
    /// Ask display widgets to highlight a response button, `None` clears.
    HighlightCss { class: Option<String> },
}

/// What kind of slide the queue is currently showing.
///
/// The host has a richer screen taxonomy; for dispatch purposes only the
/// card / non-card distinction matters (non-card slides are rated without a
/// reveal step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Card,
    NonCard,
}

/// Scroll passthrough direction for long card content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Queue control actions and queries provided by the host.
///
/// All calls may suspend; none of them are cancelled mid-flight on teardown,
/// so late completions must be harmless.
pub trait QueueHost: Send + Sync + 'static {
    /// Reveal the answer of the current card.
    fn reveal_answer(&self) -> impl Future<Output = ()> + Send;

    /// Rate the current card with a host score code.
    fn rate_current_card(&self, score: ScoreCode) -> impl Future<Output = ()> + Send;

    /// Navigate back to the previously reviewed card.
    fn go_back_to_previous_card(&self) -> impl Future<Output = ()> + Send;

    /// Scroll the card view.
    fn scroll(&self, direction: ScrollDirection) -> impl Future<Output = ()> + Send;

    /// Number of cards left in the queue, if the host knows it.
    fn remaining_cards(&self) -> impl Future<Output = Option<u32>> + Send;

    /// Current queue screen type, if the host exposes it.
    fn current_screen(&self) -> impl Future<Output = Option<ScreenKind>> + Send;

    /// Whether the queue is in lookback (history review) mode.
    fn in_lookback_mode(&self) -> impl Future<Output = bool> + Send;

    /// Whether the current card's answer has been revealed.
    fn has_revealed_answer(&self) -> impl Future<Output = bool> + Send;

    /// Show a transient advisory notice to the user.
    fn notify(&self, message: &str) -> impl Future<Output = ()> + Send;
}
