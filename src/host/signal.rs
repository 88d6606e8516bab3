use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::refresh::{SignalRegistry, Subscription};

use super::event_loop::HostEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const SIGNAL_CAPACITY: usize = 16;

/// Process-wide broadcast of named actions. Cloning shares the same channel.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<String>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Broadcast `action`; returns how many listeners saw it. Nobody listening is fine.
    pub fn emit(&self, action: &str) -> usize {
        match self.tx.send(action.to_string()) {
            Ok(receivers) => receivers,
            Err(_) => {
                log_debug!("No listeners for {action}");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

struct Listener {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registers refresh listeners on a [`SignalBus`]. Each listener is a task
/// that turns matching broadcasts into [`HostEvent::ExplicitRefresh`] for the
/// host loop, so the refresh itself still runs on the loop.
pub struct BroadcastRegistry {
    bus: SignalBus,
    events: mpsc::UnboundedSender<HostEvent>,
    listeners: HashMap<Uuid, Listener>,
}

impl BroadcastRegistry {
    pub(crate) fn new(bus: SignalBus, events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            bus,
            events,
            listeners: HashMap::new(),
        }
    }

    pub fn active_listeners(&self) -> usize {
        self.listeners.len()
    }
}

impl SignalRegistry for BroadcastRegistry {
    fn subscribe(&mut self, action: &str) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("refresh listener needs a running tokio runtime")?;

        let subscription = Subscription::new(action);
        let cancel_token = CancellationToken::new();
        let handle = runtime.spawn(forward_signals(
            self.bus.subscribe(),
            subscription.action.clone(),
            self.events.clone(),
            cancel_token.clone(),
        ));

        self.listeners.insert(
            subscription.id,
            Listener {
                cancel_token,
                handle,
            },
        );
        Ok(subscription)
    }

    fn unsubscribe(&mut self, subscription: &Subscription) -> Result<()> {
        let listener = self
            .listeners
            .remove(&subscription.id)
            .ok_or_else(|| anyhow!("refresh listener {} is not registered", subscription.id))?;
        listener.cancel_token.cancel();
        Ok(())
    }
}

impl Drop for BroadcastRegistry {
    fn drop(&mut self) {
        for (_, listener) in self.listeners.drain() {
            listener.cancel_token.cancel();
            listener.handle.abort();
        }
    }
}

async fn forward_signals(
    mut signals: broadcast::Receiver<String>,
    action: String,
    events: mpsc::UnboundedSender<HostEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            received = signals.recv() => {
                let forward = match received {
                    Ok(name) => name == action,
                    // Missed signals all mean "refresh now"; one refresh covers them.
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log_warn!("Refresh listener lagged by {missed} signal(s)");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if forward && events.send(HostEvent::ExplicitRefresh).is_err() {
                    break;
                }
            }
        }
    }

    log_info!("Refresh listener for {action} stopped");
}
