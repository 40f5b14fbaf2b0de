//! gilrs-backed gamepad source.
//!
//! Adapts the gilrs event/state API to the poller's two-question contract:
//! "is something connected" and "what is pressed right now". gilrs events
//! are pumped on every call so connect/disconnect bookkeeping stays fresh
//! even though the poller only reads level state.

use crate::input::poller::{GamepadSource, PadSample, PollerError};
use gilrs::{Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::fmt;
use tracing::{debug, info, warn};

/// Standard-layout button index for each gilrs button, in index order.
///
/// Follows the common mapping: face buttons 0-3, bumpers 4-5, triggers
/// 6-7, Select/Start 8-9, stick clicks 10-11, d-pad 12-15.
const BUTTON_LAYOUT: [(u8, Button); 16] = [
    (0, Button::South),
    (1, Button::East),
    (2, Button::West),
    (3, Button::North),
    (4, Button::LeftTrigger),
    (5, Button::RightTrigger),
    (6, Button::LeftTrigger2),
    (7, Button::RightTrigger2),
    (8, Button::Select),
    (9, Button::Start),
    (10, Button::LeftThumb),
    (11, Button::RightThumb),
    (12, Button::DPadUp),
    (13, Button::DPadDown),
    (14, Button::DPadLeft),
    (15, Button::DPadRight),
];

pub struct GilrsSource {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GilrsSource {
    pub fn new() -> Result<Self, PollerError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            warn!("Failed to initialize gilrs: {}", e);
            PollerError::InitializationError(e.to_string())
        })?;
        Ok(Self {
            gilrs,
            active: None,
        })
    }

    /// Drains pending gilrs events, tracking connects and disconnects of
    /// the active gamepad. Button and axis events are ignored here; the
    /// poller reads level state instead.
    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    debug!("gilrs reports gamepad {} connected", id);
                    if self.active.is_none() {
                        self.active = Some(id);
                    }
                }
                EventType::Disconnected => {
                    debug!("gilrs reports gamepad {} disconnected", id);
                    if self.active == Some(id) {
                        self.active = None;
                    }
                }
                _ => {}
            }
        }
    }

    /// Raw identifier in the shape the identity parser expects, with
    /// vendor/product IDs when the backend exposes them.
    fn raw_identifier(gamepad: &Gamepad<'_>) -> String {
        match (gamepad.vendor_id(), gamepad.product_id()) {
            (Some(vendor), Some(product)) => format!(
                "{} (Vendor: {:04x} Product: {:04x})",
                gamepad.name(),
                vendor,
                product
            ),
            _ => gamepad.name().to_string(),
        }
    }
}

impl fmt::Debug for GilrsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GilrsSource")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl GamepadSource for GilrsSource {
    fn poll_connected(&mut self) -> Option<String> {
        self.pump_events();

        // Pick up gamepads that were already attached before we started.
        if self.active.is_none() {
            self.active = self
                .gilrs
                .gamepads()
                .find(|(_, g)| g.is_connected())
                .map(|(id, _)| id);
        }

        let id = self.active?;
        let gamepad = self.gilrs.gamepad(id);
        if !gamepad.is_connected() {
            self.active = None;
            return None;
        }
        Some(Self::raw_identifier(&gamepad))
    }

    fn sample(&mut self) -> Option<PadSample> {
        self.pump_events();

        let id = self.active?;
        let gamepad = self.gilrs.gamepad(id);
        if !gamepad.is_connected() {
            self.active = None;
            return None;
        }

        let mut sample = PadSample::default();
        for (index, button) in BUTTON_LAYOUT {
            sample.pressed[index as usize] = gamepad.is_pressed(button);
        }
        Some(sample)
    }
}
