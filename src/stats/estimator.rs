//! The statistics recurrence.

use crate::host::ScoreCode;
use crate::stats::{format_remaining, round2, QueueSessionStats, StatsSnapshot};
use chrono::{DateTime, Duration, Local};
use tracing::debug;

/// Event-driven accumulator for queue session statistics.
///
/// Idle until the first queue-enter; reveal and complete events arriving
/// outside a session are ignored rather than guessed at. The session
/// timer advances only on reveals: the gap between the last mark and the
/// reveal is the time spent thinking about the card, which is what the
/// throughput metrics are built on.
#[derive(Debug, Default)]
pub struct StatsEstimator {
    session: Option<ActiveSession>,
}

#[derive(Debug)]
struct ActiveSession {
    stats: QueueSessionStats,
    last_mark: DateTime<Local>,
}

impl StatsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_session(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a fresh session, discarding any previous counters.
    pub fn on_queue_enter(&mut self, now: DateTime<Local>) {
        debug!("Queue entered, resetting session statistics");
        self.session = Some(ActiveSession {
            stats: QueueSessionStats::new(now),
            last_mark: now,
        });
    }

    /// Accumulates time-to-reveal for the current card and re-marks.
    ///
    /// Returns the updated total minutes, `None` outside a session.
    pub fn on_reveal(&mut self, now: DateTime<Local>) -> Option<f64> {
        let session = self.session.as_mut()?;
        let elapsed = minutes_between(session.last_mark, now);
        session.stats.total_time_spent_minutes += elapsed;
        session.last_mark = now;
        debug!(
            "Answer revealed after {:.3} minutes, {:.3} total",
            elapsed, session.stats.total_time_spent_minutes
        );
        Some(session.stats.total_time_spent_minutes)
    }

    /// Records a completed card and recomputes the derived metrics.
    ///
    /// `remaining` is the host's remaining-card count; without it (or
    /// without throughput yet) the estimate degrades to the unbounded
    /// sentinel instead of surfacing a division by zero.
    pub fn on_complete(
        &mut self,
        now: DateTime<Local>,
        score: ScoreCode,
        remaining: Option<u32>,
    ) -> Option<StatsSnapshot> {
        let session = self.session.as_mut()?;
        session.stats.total_cards_completed += 1;
        if score.is_again() {
            session.stats.total_again_count += 1;
        }

        let stats = &session.stats;
        let successful_cards = stats.total_cards_completed - stats.total_again_count;
        let minutes = stats.total_time_spent_minutes;

        let success_cpm = if minutes > 0.0 && successful_cards > 0 {
            round2(successful_cards as f64 / minutes)
        } else {
            0.0
        };
        let overall_cpm = if minutes > 0.0 && stats.total_cards_completed > 0 {
            round2(stats.total_cards_completed as f64 / minutes)
        } else {
            0.0
        };

        let (remaining_display, expected_completion) = match remaining {
            Some(remaining) if overall_cpm > 0.0 && remaining > 0 => {
                let remaining_minutes = remaining as f64 / overall_cpm;
                let eta = now + Duration::seconds((remaining_minutes * 60.0) as i64);
                (format_remaining(remaining_minutes), Some(eta))
            }
            _ => (crate::stats::UNBOUNDED.to_string(), None),
        };

        Some(StatsSnapshot {
            success_cpm,
            overall_cpm,
            total_cards_completed: stats.total_cards_completed,
            total_again_count: stats.total_again_count,
            total_time_spent_minutes: minutes,
            remaining_display,
            expected_completion,
        })
    }
}

fn minutes_between(from: DateTime<Local>, to: DateTime<Local>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + seconds, 0).single().expect("valid timestamp")
    }

    #[test]
    fn two_card_session_produces_expected_rates() {
        let mut estimator = StatsEstimator::new();
        estimator.on_queue_enter(at(0));

        // First card: 10 seconds to reveal, rated good.
        assert_eq!(estimator.on_reveal(at(10)), Some(10.0 / 60.0));
        let snapshot = estimator
            .on_complete(at(10), ScoreCode::Good, Some(12))
            .expect("in session");
        assert_eq!(snapshot.total_cards_completed, 1);
        assert_eq!(snapshot.total_again_count, 0);
        assert_eq!(snapshot.success_cpm, 6.0);
        assert_eq!(snapshot.overall_cpm, 6.0);
        // 12 remaining at 6 cpm is 2 minutes.
        assert_eq!(snapshot.remaining_display, "2m 0s");
        assert_eq!(snapshot.expected_completion, Some(at(10 + 120)));

        // Second card: another 10 seconds, failed.
        assert_eq!(estimator.on_reveal(at(20)), Some(20.0 / 60.0));
        let snapshot = estimator
            .on_complete(at(20), ScoreCode::Again, Some(11))
            .expect("in session");
        assert_eq!(snapshot.total_cards_completed, 2);
        assert_eq!(snapshot.total_again_count, 1);
        // One success in a third of a minute, two completions overall.
        assert_eq!(snapshot.success_cpm, 3.0);
        assert_eq!(snapshot.overall_cpm, 6.0);
    }

    #[test]
    fn completion_without_reveal_yields_zero_rates() {
        let mut estimator = StatsEstimator::new();
        estimator.on_queue_enter(at(0));

        let snapshot = estimator
            .on_complete(at(0), ScoreCode::Good, Some(5))
            .expect("in session");
        assert_eq!(snapshot.success_cpm, 0.0);
        assert_eq!(snapshot.overall_cpm, 0.0);
        assert_eq!(snapshot.remaining_display, "∞");
        assert_eq!(snapshot.expected_completion, None);
    }

    #[test]
    fn unknown_or_zero_remaining_uses_the_sentinel() {
        let mut estimator = StatsEstimator::new();
        estimator.on_queue_enter(at(0));
        estimator.on_reveal(at(30));

        let snapshot = estimator
            .on_complete(at(30), ScoreCode::Good, None)
            .expect("in session");
        assert_eq!(snapshot.remaining_display, "∞");

        estimator.on_reveal(at(60));
        let snapshot = estimator
            .on_complete(at(60), ScoreCode::Good, Some(0))
            .expect("in session");
        assert_eq!(snapshot.remaining_display, "∞");
        assert_eq!(snapshot.expected_completion, None);
    }

    #[test]
    fn events_outside_a_session_are_ignored() {
        let mut estimator = StatsEstimator::new();
        assert_eq!(estimator.on_reveal(at(10)), None);
        assert!(estimator.on_complete(at(10), ScoreCode::Good, Some(3)).is_none());
        assert!(!estimator.in_session());
    }

    #[test]
    fn queue_reenter_resets_counters() {
        let mut estimator = StatsEstimator::new();
        estimator.on_queue_enter(at(0));
        estimator.on_reveal(at(10));
        estimator.on_complete(at(10), ScoreCode::Again, Some(5));

        estimator.on_queue_enter(at(100));
        assert_eq!(estimator.on_reveal(at(110)), Some(10.0 / 60.0));
        let snapshot = estimator
            .on_complete(at(110), ScoreCode::Good, Some(5))
            .expect("in session");
        assert_eq!(snapshot.total_cards_completed, 1);
        assert_eq!(snapshot.total_again_count, 0);
    }
}
