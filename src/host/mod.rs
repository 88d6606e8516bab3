//! In-process stand-in for the widget host: delivers lifecycle and periodic
//! events to a [`RefreshCoordinator`] and carries the explicit refresh signal.

mod event_loop;
mod signal;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::refresh::RefreshCoordinator;
use crate::render::RenderSurface;
use crate::settings::WidgetSettings;
use crate::store::KeyValueStore;

pub use event_loop::{HostEvent, HostHandle, WidgetHost};
pub use signal::{BroadcastRegistry, SignalBus};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Wire up and start the provider called `name` from `settings`. Must be
/// called from inside a tokio runtime.
pub fn launch_provider<S, R>(
    settings: &WidgetSettings,
    name: &str,
    store: S,
    surface: R,
    bus: SignalBus,
) -> Result<HostHandle<S, R, BroadcastRegistry>>
where
    S: KeyValueStore + Send + 'static,
    R: RenderSurface + Send + 'static,
{
    tokio::runtime::Handle::try_current()
        .context("widget host needs a running tokio runtime")?;
    settings.validate()?;
    let provider = settings
        .provider(name)
        .with_context(|| format!("no widget provider named {name}"))?
        .clone();

    let host = WidgetHost::new(bus, settings.refresh_action.clone());
    let coordinator = RefreshCoordinator::new(
        provider,
        settings.package_name.clone(),
        settings.refresh_action.clone(),
        store,
        surface,
        host.registry(),
    );

    log_info!("Launching {name} widget provider");
    Ok(host.spawn(
        coordinator,
        Duration::from_secs(settings.refresh_period_secs),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::refresh::coordinator::testing::RecordingSurface;
    use crate::store::{MemoryStore, StoreValue};

    #[tokio::test]
    async fn nutrition_provider_derives_percentage() {
        let store = Arc::new(MemoryStore::from_entries([
            ("nutrition_calories", StoreValue::Int(1500)),
            ("nutrition_calories_goal", StoreValue::Int(2000)),
        ]));
        let handle = launch_provider(
            &WidgetSettings::default(),
            "nutrition",
            store,
            RecordingSurface::default(),
            SignalBus::new(),
        )
        .unwrap();
        let mut reports = handle.reports();

        handle.add_instances(vec![crate::render::InstanceId(1)]).unwrap();
        reports.changed().await.unwrap();
        let report = reports.borrow_and_update().clone().unwrap();
        assert_eq!(report.state.percentage(), 75);
        assert_eq!(report.state.consumed(), 1500);

        let coordinator = handle.shutdown().await.unwrap();
        assert_eq!(coordinator.surface().committed[0].bindings.len(), 1);
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error() {
        let result = launch_provider(
            &WidgetSettings::default(),
            "steps",
            MemoryStore::new(),
            RecordingSurface::default(),
            SignalBus::new(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_refresh_period_is_rejected() {
        let settings = WidgetSettings {
            refresh_period_secs: 0,
            ..Default::default()
        };
        let result = launch_provider(
            &settings,
            "calories",
            MemoryStore::new(),
            RecordingSurface::default(),
            SignalBus::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn launching_outside_runtime_fails() {
        let result = launch_provider(
            &WidgetSettings::default(),
            "calories",
            MemoryStore::new(),
            RecordingSurface::default(),
            SignalBus::new(),
        );
        assert!(result.is_err());
    }
}
