pub mod coordinator;
pub mod listener;

pub use coordinator::{InstanceOutcome, RefreshCoordinator, RefreshReport};
pub use listener::{ListenerState, SignalRegistry, Subscription};

/// Broadcast action any collaborator can emit to force an immediate refresh of
/// every widget, outside the host's periodic schedule.
pub const ACTION_WIDGET_UPDATE: &str = "com.rexa.nutrizenai.ACTION_WIDGET_UPDATE";
