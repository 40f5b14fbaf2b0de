//! Edge-detecting gamepad poller built as a typestate machine.
//!
//! The poller owns a [`GamepadSource`] and walks a fixed lifecycle:
//! `Disconnected` (scanning for a device) -> `Connected` (device found,
//! edges reset) -> `Polling` (sampling loop) -> back to `Disconnected`
//! when the device drops. Each state exposes only the operations that are
//! valid in it, so sampling before a device exists is unrepresentable.
//!
//! [`PollerHandle::spawn`] drives the machine on a tokio task and is the
//! only entry point the rest of the crate uses.

use crate::input::{ButtonEdge, EdgeState, InputEvent};
use chrono::Local;
use statum::{machine, state};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Full pressed-state of a standard-layout gamepad at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PadSample {
    pub pressed: [bool; 16],
}

/// Synchronous gamepad backend the poller samples from.
///
/// Implementations pump their own event queues inside these calls; the
/// poller only ever asks two questions per tick.
pub trait GamepadSource: fmt::Debug + Send {
    /// Scans for an attached gamepad and returns its raw identifier.
    fn poll_connected(&mut self) -> Option<String>;

    /// Samples the active gamepad, `None` once it has disconnected.
    fn sample(&mut self) -> Option<PadSample>;
}

#[derive(Clone, Debug)]
pub struct PollerSettings {
    /// Sampling period while a gamepad is connected.
    pub poll_interval_ms: u64,
    /// Scan period while waiting for a gamepad to appear.
    pub connect_scan_interval_ms: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 4,
            connect_scan_interval_ms: 250,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("Failed to initialize input source: {0}")]
    InitializationError(String),
}

#[state]
#[derive(Debug)]
pub enum PollState {
    Disconnected,
    Connected,
    Polling,
}

#[machine]
#[derive(Debug)]
pub struct InputPoller<S: PollState> {
    source: Box<dyn GamepadSource>,
    settings: PollerSettings,
    event_sender: mpsc::Sender<InputEvent>,
    edges: EdgeState,
    raw_id: Option<String>,
}

impl InputPoller<Disconnected> {
    pub fn create(
        source: Box<dyn GamepadSource>,
        settings: Option<PollerSettings>,
        event_sender: mpsc::Sender<InputEvent>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating input poller with settings: {:?}", settings);
        Self::new(source, settings, event_sender, EdgeState::new(), None)
    }

    /// Scans until a gamepad appears or the token cancels.
    ///
    /// Returns `None` on cancellation or when the event receiver is gone,
    /// both of which end the poller for good.
    pub async fn wait_for_gamepad(
        mut self,
        cancel: &CancellationToken,
    ) -> Option<InputPoller<Connected>> {
        info!(
            "Waiting for gamepad, scanning every {}ms",
            self.settings.connect_scan_interval_ms
        );
        let mut scan =
            tokio::time::interval(Duration::from_millis(self.settings.connect_scan_interval_ms));

        loop {
            tokio::select! {
                _ = scan.tick() => {
                    if let Some(raw_id) = self.source.poll_connected() {
                        info!("Gamepad connected: {}", raw_id);
                        let event = InputEvent::Connected {
                            raw_id: raw_id.clone(),
                            timestamp: Local::now(),
                        };
                        if self.event_sender.send(event).await.is_err() {
                            warn!("Event receiver dropped while announcing connect");
                            return None;
                        }
                        self.raw_id = Some(raw_id);
                        return Some(self.transition());
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Poller cancelled while waiting for gamepad");
                    return None;
                }
            }
        }
    }
}

impl InputPoller<Connected> {
    /// Arms edge detection from a clean slate and enters the sampling loop
    /// state. Buttons held during connect produce press edges on the first
    /// tick rather than being silently swallowed.
    pub fn begin_polling(mut self) -> InputPoller<Polling> {
        debug!("Gamepad ready, resetting edge state");
        self.edges.reset();
        self.transition()
    }
}

impl InputPoller<Polling> {
    /// Samples at the configured interval and emits edge events until the
    /// device disconnects (returns the machine back in `Disconnected`), the
    /// token cancels, or the receiver goes away (both return `None`).
    pub async fn run(
        mut self,
        cancel: &CancellationToken,
    ) -> Option<InputPoller<Disconnected>> {
        info!(
            "Polling gamepad every {}ms",
            self.settings.poll_interval_ms
        );
        let mut tick = tokio::time::interval(Duration::from_millis(self.settings.poll_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(sample) = self.source.sample() else {
                        warn!("Gamepad disconnected");
                        let event = InputEvent::Disconnected { timestamp: Local::now() };
                        if self.event_sender.send(event).await.is_err() {
                            return None;
                        }
                        self.raw_id = None;
                        self.edges.reset();
                        return Some(self.transition());
                    };

                    for (index, kind) in self.edges.detect(&sample.pressed) {
                        let edge = ButtonEdge {
                            index,
                            kind,
                            timestamp: Local::now(),
                        };
                        debug!("Button edge: {:?}", edge);
                        if self.event_sender.send(InputEvent::Edge(edge)).await.is_err() {
                            warn!("Event receiver dropped, stopping poller");
                            return None;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Poller cancelled while polling");
                    return None;
                }
            }
        }
    }
}

/// Public handle to the poller task.
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Spawns the poller lifecycle loop on a tokio task.
    pub fn spawn(
        source: Box<dyn GamepadSource>,
        settings: Option<PollerSettings>,
        event_sender: mpsc::Sender<InputEvent>,
    ) -> Self {
        info!("Spawning input poller");
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let mut disconnected = InputPoller::create(source, settings, event_sender);
            loop {
                let Some(connected) = disconnected.wait_for_gamepad(&task_cancel).await else {
                    break;
                };
                match connected.begin_polling().run(&task_cancel).await {
                    Some(machine) => disconnected = machine,
                    None => break,
                }
            }
            info!("Input poller task finished");
        });

        Self { cancel, task }
    }

    /// Cancels the poller and waits for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Poller task panicked during shutdown: {}", e);
        }
    }
}
