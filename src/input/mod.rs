//! Gamepad input subsystem.
//!
//! A polling pipeline turns raw gamepad state into discrete events:
//!
//! ```text
//! Gamepad ──► GamepadSource ──► InputPoller ──► InputEvent
//!             (pressed bits)    (edge detect)   (mpsc)
//! ```
//!
//! The poller samples the full button state every tick and reports only
//! transitions. Downstream consumers never see level state, so a held
//! button fires exactly one press and one release no matter how long it is
//! held or how fast the poll interval is.

pub mod gilrs_source;
pub mod poller;

pub use gilrs_source::GilrsSource;
pub use poller::{GamepadSource, PadSample, PollerError, PollerHandle, PollerSettings};

use chrono::{DateTime, Local};

/// Button indices of the standard gamepad layout that can carry bindings.
///
/// Stick clicks (10, 11) are deliberately absent: they are too easy to hit
/// while scrolling and are reserved for the host.
pub const TRACKED_BUTTONS: [u8; 14] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 12, 13, 14, 15];

/// Discrete input events emitted by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A gamepad became the active input device.
    Connected {
        raw_id: String,
        timestamp: DateTime<Local>,
    },
    /// The active gamepad went away.
    Disconnected { timestamp: DateTime<Local> },
    /// A tracked button changed state.
    Edge(ButtonEdge),
}

/// A single press or release transition on one button.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonEdge {
    pub index: u8,
    pub kind: EdgeKind,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Press,
    Release,
}

/// Per-button previous-state memory for edge detection.
///
/// Reset on every connect and disconnect so a button held across a
/// reconnect produces a fresh press edge instead of a phantom release.
#[derive(Debug, Clone, Default)]
pub struct EdgeState {
    pressed: [bool; 16],
}

impl EdgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all held buttons.
    pub fn reset(&mut self) {
        self.pressed = [false; 16];
    }

    /// Compares a fresh sample against the remembered state and returns
    /// the transitions on tracked buttons, updating the memory in place.
    pub fn detect(&mut self, sample: &[bool; 16]) -> Vec<(u8, EdgeKind)> {
        let mut edges = Vec::new();
        for &index in &TRACKED_BUTTONS {
            let i = index as usize;
            match (self.pressed[i], sample[i]) {
                (false, true) => edges.push((index, EdgeKind::Press)),
                (true, false) => edges.push((index, EdgeKind::Release)),
                _ => {}
            }
            self.pressed[i] = sample[i];
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with(indices: &[u8]) -> [bool; 16] {
        let mut sample = [false; 16];
        for &i in indices {
            sample[i as usize] = true;
        }
        sample
    }

    #[test]
    fn press_and_release_fire_exactly_once() {
        let mut edges = EdgeState::new();

        // Idle, held for two ticks, released: one press, one release.
        assert!(edges.detect(&sample_with(&[])).is_empty());
        assert_eq!(edges.detect(&sample_with(&[3])), vec![(3, EdgeKind::Press)]);
        assert!(edges.detect(&sample_with(&[3])).is_empty());
        assert_eq!(edges.detect(&sample_with(&[])), vec![(3, EdgeKind::Release)]);
        assert!(edges.detect(&sample_with(&[])).is_empty());
    }

    #[test]
    fn simultaneous_edges_are_all_reported() {
        let mut edges = EdgeState::new();
        edges.detect(&sample_with(&[0]));

        let result = edges.detect(&sample_with(&[7]));
        assert!(result.contains(&(0, EdgeKind::Release)));
        assert!(result.contains(&(7, EdgeKind::Press)));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn stick_clicks_are_ignored() {
        let mut edges = EdgeState::new();
        assert!(edges.detect(&sample_with(&[10, 11])).is_empty());
        assert!(edges.detect(&sample_with(&[])).is_empty());
    }

    #[test]
    fn reset_forgets_held_buttons() {
        let mut edges = EdgeState::new();
        edges.detect(&sample_with(&[5]));
        edges.reset();

        // No phantom release after reset; the re-observed hold is a press.
        assert_eq!(edges.detect(&sample_with(&[5])), vec![(5, EdgeKind::Press)]);
    }
}
