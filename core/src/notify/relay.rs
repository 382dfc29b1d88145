use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::mpsc;

use crate::api::wire::asset_label;

use super::{
    board::{element_id, format_average},
    event::{HubEvent, HubKind, PushMessage},
    AverageBoard, Notifier, RateLimiter, Toast,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Turns hub events into toasts and board updates.
///
/// Connection trouble is reported at most once per throttle window and key;
/// a successful (re)connect clears the hub's keys so the next failure shows
/// immediately.
pub struct NotificationRelay<B: AverageBoard> {
    notifier: Arc<dyn Notifier>,
    board: B,
    limiter: RateLimiter,
    states: HashMap<HubKind, ConnectionState>,
}

impl<B: AverageBoard> NotificationRelay<B> {
    pub fn new(notifier: Arc<dyn Notifier>, board: B, throttle: Duration) -> Self {
        NotificationRelay {
            notifier,
            board,
            limiter: RateLimiter::new(throttle),
            states: HashMap::new(),
        }
    }

    pub fn state(&self, hub: HubKind) -> ConnectionState {
        self.states
            .get(&hub)
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    fn set_state(&mut self, hub: HubKind, state: ConnectionState) {
        let previous = self.states.insert(hub, state);
        if previous != Some(state) {
            tracing::debug!(%hub, %state, "hub connection state changed");
        }
    }

    #[tracing::instrument(skip(self, now), level = "debug")]
    pub fn handle(&mut self, hub: HubKind, event: HubEvent, now: Instant) {
        match event {
            HubEvent::Connecting => self.set_state(hub, ConnectionState::Connecting),
            HubEvent::Connected => {
                self.set_state(hub, ConnectionState::Connected);
                self.limiter.reset_prefix(&hub.key_prefix());
                tracing::info!(%hub, "connected to hub");
            }
            HubEvent::ConnectFailed(reason) => {
                self.set_state(hub, ConnectionState::Disconnected);
                if self.limiter.check(&hub.error_key(), now) {
                    self.notifier.notify(Toast::error(
                        "Live updates unavailable",
                        format!("Could not connect to the {} hub: {}. Retrying.", hub, reason),
                    ));
                } else {
                    tracing::debug!(%hub, %reason, "suppressing repeated connection error");
                }
            }
            HubEvent::Reconnecting(reason) => {
                self.set_state(hub, ConnectionState::Reconnecting);
                tracing::warn!(%hub, ?reason, "hub connection lost, reconnecting");
                if self.limiter.check(&hub.reconnecting_key(), now) {
                    self.notifier.notify(Toast::warning(
                        "Connection lost",
                        format!("Reconnecting to the {} hub.", hub),
                    ));
                }
            }
            HubEvent::Reconnected => {
                self.set_state(hub, ConnectionState::Connected);
                self.limiter.reset_prefix(&hub.key_prefix());
                self.notifier.notify(Toast::success(
                    "Reconnected",
                    format!("Live updates from the {} hub resumed.", hub),
                ));
            }
            HubEvent::Closed(reason) => {
                self.set_state(hub, ConnectionState::Disconnected);
                tracing::warn!(%hub, ?reason, "hub connection closed");
                if self.limiter.check(&hub.error_key(), now) {
                    self.notifier.notify(Toast::error(
                        "Connection closed",
                        format!("Live updates from the {} hub stopped.", hub),
                    ));
                }
            }
            HubEvent::Message(message) => self.on_message(message),
        }
    }

    fn on_message(&mut self, message: PushMessage) {
        let toast = match message {
            PushMessage::AssetAdded(payload) => Toast::success(
                "Asset added",
                match asset_label(&payload) {
                    Some(label) => format!("Asset {} was added.", label),
                    None => "A new asset was added.".to_owned(),
                },
            ),
            PushMessage::AssetUpdated(payload) => Toast::info(
                "Asset updated",
                match asset_label(&payload) {
                    Some(label) => format!("Asset {} was updated.", label),
                    None => "An asset was updated.".to_owned(),
                },
            ),
            PushMessage::AssetRemoved(payload) => Toast::warning(
                "Asset removed",
                match asset_label(&payload) {
                    Some(label) => format!("Asset {} was removed.", label),
                    None => "An asset was removed.".to_owned(),
                },
            ),
            PushMessage::Average { column, average } => {
                let id = element_id(&column);
                if !self.board.update(&id, &format_average(average)) {
                    tracing::trace!(%column, element = %id, "no element for average, dropping");
                }
                return;
            }
        };
        self.notifier.notify(toast);
    }

    /// Drains events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<(HubKind, HubEvent)>) -> Self {
        while let Some((hub, event)) = events.recv().await {
            self.handle(hub, event, Instant::now());
        }
        self
    }
}
