//! Queue session statistics.
//!
//! Consumes the host's queue lifecycle events and derives two throughput
//! metrics: a displayed cards-per-minute that excludes failed recalls (so
//! repeated "again" cards do not inflate apparent pace) and an overall
//! cards-per-minute used for the time-to-completion estimate, which must
//! reflect true throughput including repeats.
//!
//! [`estimator::StatsEstimator`] holds the recurrence; [`worker`] runs it
//! on a tokio task, publishes snapshots over a watch channel, and mirrors
//! them into session storage for display widgets.

pub mod estimator;
pub mod worker;

pub use estimator::StatsEstimator;
pub use worker::StatsHandle;

use chrono::{DateTime, Local};

/// Sentinel shown when no finite completion estimate exists.
pub const UNBOUNDED: &str = "∞";

/// Running counters for one review session.
///
/// Created fresh on queue-enter and overwritten by the next; there is no
/// explicit session-end event.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSessionStats {
    pub session_start: DateTime<Local>,
    pub total_time_spent_minutes: f64,
    pub total_cards_completed: u32,
    pub total_again_count: u32,
}

impl QueueSessionStats {
    pub fn new(session_start: DateTime<Local>) -> Self {
        Self {
            session_start,
            total_time_spent_minutes: 0.0,
            total_cards_completed: 0,
            total_again_count: 0,
        }
    }
}

/// Derived metrics published after each completed card.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    /// Successful (non-again) cards per minute, rounded to 2 decimals.
    pub success_cpm: f64,
    /// All completed cards per minute, rounded to 2 decimals.
    pub overall_cpm: f64,
    pub total_cards_completed: u32,
    pub total_again_count: u32,
    pub total_time_spent_minutes: f64,
    /// Formatted remaining-time estimate, [`UNBOUNDED`] when unknown.
    pub remaining_display: String,
    /// Projected clock time of queue completion, when one exists.
    pub expected_completion: Option<DateTime<Local>>,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            success_cpm: 0.0,
            overall_cpm: 0.0,
            total_cards_completed: 0,
            total_again_count: 0,
            total_time_spent_minutes: 0.0,
            remaining_display: UNBOUNDED.to_string(),
            expected_completion: None,
        }
    }
}

impl StatsSnapshot {
    /// Clock-time display of the completion estimate, empty when none.
    pub fn expected_completion_display(&self) -> String {
        self.expected_completion
            .map(|t| t.format("%-I:%M %p").to_string())
            .unwrap_or_default()
    }
}

/// Rounds to 2 decimal places, the fixed display precision for rates.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats a minute count as `Hh Mm` when at least an hour remains,
/// `Mm Ss` below that. Components are floored, never rounded up.
pub(crate) fn format_remaining(minutes: f64) -> String {
    if minutes >= 60.0 {
        let hours = (minutes / 60.0).floor() as u64;
        let mins = (minutes % 60.0).floor() as u64;
        format!("{hours}h {mins}m")
    } else {
        let mins = minutes.floor() as u64;
        let secs = ((minutes - minutes.floor()) * 60.0).floor() as u64;
        format!("{mins}m {secs}s")
    }
}
