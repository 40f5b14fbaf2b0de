//! Input-to-queue dispatcher.

use crate::host::{PluginMessage, QueueHost, ScreenKind, ScrollDirection, Storage};
use crate::input::{EdgeKind, InputEvent};
use crate::mapping::{ControllerMapping, MappingScope, MappingStore, ReviewAction};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const UNBOUND_NOTICE: &str =
    "Unbound button. Please bind the button to an action in the settings.";
const EXIT_NOTICE: &str = "Exit Queue: press Escape on the keyboard.";

/// CSS class display widgets use to highlight the response button that is
/// about to fire, `None` for actions without a response-bar counterpart.
fn highlight_class(action: ReviewAction) -> Option<&'static str> {
    match action {
        ReviewAction::AnswerAgain => Some("rn-queue-press-tooltip-forgot"),
        ReviewAction::AnswerEasy => Some("rn-queue-press-tooltip-remembered"),
        ReviewAction::AnswerGood => Some("rn-queue-press-tooltip-recalled-with-effort"),
        ReviewAction::AnswerHard => Some("rn-queue-press-tooltip-partially-recalled"),
        ReviewAction::AnswerTooEarly => Some("rn-queue-press-tooltip-skip"),
        _ => None,
    }
}

/// Routes button edges to queue actions using the resolved mapping.
///
/// Caches one resolved table per connected device and re-resolves when a
/// mapping-change broadcast arrives; no diff is pushed, only the signal.
pub struct QueueDispatcher<S: Storage, Q: QueueHost> {
    input: mpsc::Receiver<InputEvent>,
    store: MappingStore<S>,
    queue: Arc<Q>,
    notifier: broadcast::Sender<PluginMessage>,
    messages: broadcast::Receiver<PluginMessage>,
    mapping: ControllerMapping,
    scope: MappingScope,
    raw_id: Option<String>,
}

impl<S: Storage, Q: QueueHost> QueueDispatcher<S, Q> {
    pub fn new(
        input: mpsc::Receiver<InputEvent>,
        store: MappingStore<S>,
        queue: Arc<Q>,
        notifier: broadcast::Sender<PluginMessage>,
    ) -> Self {
        let messages = notifier.subscribe();
        let mapping = store.defaults().clone();
        Self {
            input,
            store,
            queue,
            notifier,
            messages,
            mapping,
            scope: MappingScope::Default,
            raw_id: None,
        }
    }

    /// Dispatch loop. Ends when the input sender is dropped or the token
    /// cancels. Pending mapping-change broadcasts are drained before the
    /// next input event so edges never fire against a stale table.
    pub async fn run(mut self, cancel: CancellationToken) {
        let (mapping, scope) = self.store.resolve(None).await;
        info!("Dispatcher started with {} scope mapping", scope);
        self.mapping = mapping;
        self.scope = scope;

        loop {
            tokio::select! {
                biased;
                msg = self.messages.recv() => match msg {
                    Ok(PluginMessage::MappingChanged { scope_key }) => {
                        debug!("Mapping changed (key: {:?}), re-resolving", scope_key);
                        self.refresh_mapping().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dispatcher lagged {} broadcasts, re-resolving", skipped);
                        self.refresh_mapping().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = self.input.recv() => match event {
                    Some(InputEvent::Connected { raw_id, .. }) => {
                        self.raw_id = Some(raw_id);
                        self.refresh_mapping().await;
                        info!("Using {} scope mapping for connected gamepad", self.scope);
                    }
                    Some(InputEvent::Disconnected { .. }) => {
                        self.raw_id = None;
                        self.refresh_mapping().await;
                    }
                    Some(InputEvent::Edge(edge)) => match edge.kind {
                        EdgeKind::Press => self.on_press(edge.index).await,
                        EdgeKind::Release => self.on_release(edge.index).await,
                    },
                    None => {
                        debug!("Input channel closed, dispatcher stopping");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("Dispatcher cancelled");
                    break;
                }
            }
        }
    }

    async fn refresh_mapping(&mut self) {
        let (mapping, scope) = self.store.resolve(self.raw_id.as_deref()).await;
        self.mapping = mapping;
        self.scope = scope;
    }

    /// Press feedback: advisory for unbound buttons, response-button
    /// highlight for ratings once the answer is visible.
    async fn on_press(&mut self, index: u8) {
        let Some(action) = self.mapping.action_for(index) else {
            debug!("Press on unbound button {}", index);
            self.queue.notify(UNBOUND_NOTICE).await;
            return;
        };

        if action.is_rating() && self.queue.has_revealed_answer().await {
            if let Some(class) = highlight_class(action) {
                let _ = self.notifier.send(PluginMessage::HighlightCss {
                    class: Some(class.to_string()),
                });
            }
        }
    }

    async fn on_release(&mut self, index: u8) {
        let _ = self.notifier.send(PluginMessage::HighlightCss { class: None });

        let Some(action) = self.mapping.action_for(index) else {
            return;
        };
        debug!("Dispatching {} for button {}", action, index);

        match action {
            ReviewAction::ScrollUp => self.queue.scroll(ScrollDirection::Up).await,
            ReviewAction::ScrollDown => self.queue.scroll(ScrollDirection::Down).await,
            ReviewAction::GoBackToPreviousCard => self.queue.go_back_to_previous_card().await,
            ReviewAction::ExitQueue => self.queue.notify(EXIT_NOTICE).await,
            ReviewAction::HideAnswer => {}
            rating => {
                let revealed = self.queue.has_revealed_answer().await;
                let non_card = matches!(
                    self.queue.current_screen().await,
                    Some(ScreenKind::NonCard)
                );
                if revealed || non_card {
                    if let Some(score) = rating.score_code() {
                        info!("Rating card as {}", rating);
                        self.queue.rate_current_card(score).await;
                    }
                } else if !self.queue.in_lookback_mode().await {
                    self.queue.reveal_answer().await;
                }
            }
        }
    }
}
