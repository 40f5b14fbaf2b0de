//! Button-to-action mapping for the review queue.
//!
//! A [`ControllerMapping`] binds standard-gamepad button indices to
//! [`ReviewAction`]s. Tables are stored per device identity with a fallback
//! chain (device -> legacy global -> built-in default) implemented by
//! [`store::MappingStore`], the single resolver all call sites share.

pub mod error;
pub mod store;

pub use error::MappingError;
pub use store::{MappingScope, MappingStore};

use crate::host::ScoreCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue interaction a button can be bound to.
///
/// A closed set: the discrete UI actions plus one variant per rating
/// outcome. Rating variants cross into the host's numeric codes only via
/// [`ReviewAction::score_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewAction {
    HideAnswer,
    GoBackToPreviousCard,
    ScrollUp,
    ScrollDown,
    ExitQueue,
    AnswerAgain,
    AnswerHard,
    AnswerGood,
    AnswerEasy,
    AnswerTooEarly,
    AnswerViewedAsLeech,
    ResetCard,
}

impl ReviewAction {
    /// Host score code for rating actions, `None` for navigation actions.
    pub fn score_code(self) -> Option<ScoreCode> {
        match self {
            ReviewAction::AnswerAgain => Some(ScoreCode::Again),
            ReviewAction::AnswerHard => Some(ScoreCode::Hard),
            ReviewAction::AnswerGood => Some(ScoreCode::Good),
            ReviewAction::AnswerEasy => Some(ScoreCode::Easy),
            ReviewAction::AnswerTooEarly => Some(ScoreCode::TooEarly),
            ReviewAction::AnswerViewedAsLeech => Some(ScoreCode::ViewedAsLeech),
            ReviewAction::ResetCard => Some(ScoreCode::Reset),
            ReviewAction::HideAnswer
            | ReviewAction::GoBackToPreviousCard
            | ReviewAction::ScrollUp
            | ReviewAction::ScrollDown
            | ReviewAction::ExitQueue => None,
        }
    }

    /// Whether this action rates the current card.
    pub fn is_rating(self) -> bool {
        self.score_code().is_some()
    }

    /// Human-readable name for toasts and mapping logs.
    pub fn pretty_name(self) -> &'static str {
        match self {
            ReviewAction::HideAnswer => "Hide Answer",
            ReviewAction::GoBackToPreviousCard => "Go Back To Previous Card",
            ReviewAction::ScrollUp => "Scroll Up",
            ReviewAction::ScrollDown => "Scroll Down",
            ReviewAction::ExitQueue => "Exit Queue",
            ReviewAction::AnswerAgain => "Answer Card As Again",
            ReviewAction::AnswerHard => "Answer Card As Hard",
            ReviewAction::AnswerGood => "Answer Card As Good",
            ReviewAction::AnswerEasy => "Answer Card As Easy",
            ReviewAction::AnswerTooEarly => "Answer Card As Too Early",
            ReviewAction::AnswerViewedAsLeech => "Answer Card As Viewed As Leech",
            ReviewAction::ResetCard => "Reset Card",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_name())
    }
}

/// Physical grouping of a button on a standard gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonGroup {
    TriggerBumper,
    DPad,
    FaceButton,
}

impl fmt::Display for ButtonGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonGroup::TriggerBumper => write!(f, "trigger/bumper"),
            ButtonGroup::DPad => write!(f, "d-pad"),
            ButtonGroup::FaceButton => write!(f, "face button"),
        }
    }
}

/// One button binding inside a mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonMapping {
    pub button_index: u8,
    pub action: ReviewAction,
    pub group: ButtonGroup,
    pub label: String,
}

/// Ordered collection of button bindings.
///
/// Button indices are expected to be unique, but duplicates are tolerated:
/// the last matching entry is authoritative on lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerMapping {
    pub buttons: Vec<ButtonMapping>,
}

impl ControllerMapping {
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Configured action for a button index, `None` when unbound.
    ///
    /// Unbound is a valid terminal state of lookup, not an error; the caller
    /// surfaces it to the user and must not dispatch anything.
    pub fn action_for(&self, button_index: u8) -> Option<ReviewAction> {
        self.buttons
            .iter()
            .rev()
            .find(|m| m.button_index == button_index)
            .map(|m| m.action)
    }

    /// Physical group of a button index, `None` when unbound.
    pub fn group_for(&self, button_index: u8) -> Option<ButtonGroup> {
        self.buttons
            .iter()
            .rev()
            .find(|m| m.button_index == button_index)
            .map(|m| m.group)
    }

    /// All button indices of a group, in table order.
    pub fn buttons_in_group(&self, group: ButtonGroup) -> Vec<u8> {
        self.buttons
            .iter()
            .filter(|m| m.group == group)
            .map(|m| m.button_index)
            .collect()
    }
}

fn entry(button_index: u8, action: ReviewAction, group: ButtonGroup, label: &str) -> ButtonMapping {
    ButtonMapping {
        button_index,
        action,
        group,
        label: label.to_string(),
    }
}

/// Built-in immutable mapping table.
///
/// Every rating is reachable from each button group so the queue stays
/// drivable one-handed: face buttons, d-pad, and triggers/bumpers each cover
/// Again/Easy/Good/Hard, with Select and Start bound to skip and back.
pub fn default_mapping() -> ControllerMapping {
    use ButtonGroup::{DPad, FaceButton, TriggerBumper};
    use ReviewAction::*;

    ControllerMapping {
        buttons: vec![
            entry(3, AnswerAgain, FaceButton, "North Button"),
            entry(12, AnswerAgain, DPad, "North D-Pad"),
            entry(6, AnswerAgain, TriggerBumper, "Left Trigger"),
            entry(0, AnswerEasy, FaceButton, "South Button"),
            entry(13, AnswerEasy, DPad, "South D-Pad"),
            entry(7, AnswerEasy, TriggerBumper, "Right Trigger"),
            entry(1, AnswerGood, FaceButton, "East Button"),
            entry(15, AnswerGood, DPad, "East D-Pad"),
            entry(5, AnswerGood, TriggerBumper, "Right Bumper"),
            entry(2, AnswerHard, FaceButton, "West Button"),
            entry(14, AnswerHard, DPad, "West D-Pad"),
            entry(4, AnswerHard, TriggerBumper, "Left Bumper"),
            entry(8, AnswerTooEarly, TriggerBumper, "Select Button"),
            entry(9, GoBackToPreviousCard, TriggerBumper, "Start Button"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_covers_expected_buttons() {
        let mapping = default_mapping();
        assert_eq!(mapping.buttons.len(), 14);
        assert_eq!(mapping.action_for(3), Some(ReviewAction::AnswerAgain));
        assert_eq!(mapping.action_for(9), Some(ReviewAction::GoBackToPreviousCard));
        // Stick clicks are not part of the default layout.
        assert_eq!(mapping.action_for(10), None);
        assert_eq!(mapping.action_for(11), None);
    }

    #[test]
    fn lookup_returns_none_for_unbound_button() {
        let mapping = default_mapping();
        assert_eq!(mapping.action_for(42), None);
        assert_eq!(mapping.group_for(42), None);
    }

    #[test]
    fn last_duplicate_entry_wins() {
        let mut mapping = default_mapping();
        mapping.buttons.push(entry(
            3,
            ReviewAction::ExitQueue,
            ButtonGroup::FaceButton,
            "North Button",
        ));
        assert_eq!(mapping.action_for(3), Some(ReviewAction::ExitQueue));
    }

    #[test]
    fn buttons_in_group_matches_layout() {
        let mapping = default_mapping();
        assert_eq!(mapping.buttons_in_group(ButtonGroup::DPad), vec![12, 13, 15, 14]);
        assert_eq!(mapping.buttons_in_group(ButtonGroup::FaceButton), vec![3, 0, 1, 2]);
    }

    #[test]
    fn score_codes_only_for_rating_actions() {
        assert_eq!(ReviewAction::AnswerAgain.score_code(), Some(ScoreCode::Again));
        assert_eq!(ReviewAction::AnswerGood.score_code(), Some(ScoreCode::Good));
        assert_eq!(ReviewAction::ScrollUp.score_code(), None);
        assert!(!ReviewAction::GoBackToPreviousCard.is_rating());
        assert!(ReviewAction::ResetCard.is_rating());
    }

    #[test]
    fn mapping_roundtrips_through_toml() {
        let mapping = default_mapping();
        let serialized = toml::to_string(&mapping).expect("serialize");
        let parsed: ControllerMapping = toml::from_str(&serialized).expect("parse");
        assert_eq!(parsed, mapping);
    }
}
