use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Handle of an active listener for the explicit refresh signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub action: String,
}

impl Subscription {
    pub fn new(action: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.to_string(),
        }
    }
}

/// Where the explicit refresh listener gets (un)registered.
pub trait SignalRegistry {
    fn subscribe(&mut self, action: &str) -> Result<Subscription>;

    fn unsubscribe(&mut self, subscription: &Subscription) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListenerState {
    #[default]
    Unregistered,
    Registered(Subscription),
}

impl ListenerState {
    pub fn is_registered(&self) -> bool {
        matches!(self, ListenerState::Registered(_))
    }

    /// Enter `Registered`. A second call while registered is a no-op; a failed
    /// subscribe is logged and leaves the state `Unregistered`.
    pub fn register<R: SignalRegistry + ?Sized>(&mut self, registry: &mut R, action: &str) {
        if let ListenerState::Registered(subscription) = self {
            log_debug!("Refresh listener already registered ({})", subscription.id);
            return;
        }

        match registry.subscribe(action) {
            Ok(subscription) => {
                log_info!("Registered refresh listener {} for {}", subscription.id, action);
                *self = ListenerState::Registered(subscription);
            }
            Err(err) => {
                log_error!("Error registering refresh listener for {action}: {err:#}");
            }
        }
    }

    /// Leave `Registered`. The state ends `Unregistered` even when the
    /// unsubscribe fails, so the same subscription is never released twice.
    pub fn unregister<R: SignalRegistry + ?Sized>(&mut self, registry: &mut R) {
        match std::mem::take(self) {
            ListenerState::Unregistered => {
                log_debug!("Refresh listener not registered, nothing to release");
            }
            ListenerState::Registered(subscription) => {
                match registry.unsubscribe(&subscription) {
                    Ok(()) => log_info!("Unregistered refresh listener {}", subscription.id),
                    Err(err) => log_error!(
                        "Error unregistering refresh listener {}: {err:#}",
                        subscription.id
                    ),
                }
            }
        }
    }
}
