pub mod diagnostics;
pub mod host;
pub mod refresh;
pub mod render;
pub mod resolve;
pub mod settings;
pub mod state;
pub mod store;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

pub use diagnostics::{dump_store, StoreDump};
pub use host::{launch_provider, HostEvent, HostHandle, SignalBus, WidgetHost};
pub use refresh::{RefreshCoordinator, RefreshReport, ACTION_WIDGET_UPDATE};
pub use render::{render, InstanceId, LogSurface, RenderSurface, RenderedWidget, ViewModel};
pub use resolve::{resolve_state, ResolutionPolicy, ResolutionVariant};
pub use settings::{SettingsStore, WidgetSettings};
pub use state::{RawFieldSet, WidgetState};
pub use store::{
    seed_sample_data, KeyValueStore, MemoryStore, SqliteStore, StoreError, StoreValue,
};
pub use utils::init_logging;

/// Overrides where the preview keeps its settings and preferences database.
pub const DATA_DIR_ENV: &str = "NUTRIZEN_WIDGET_DIR";

/// Preview runner: places one widget per configured provider on a
/// [`LogSurface`], fires the explicit refresh signal once, then keeps the
/// periodic schedule running until Ctrl-C.
pub fn run() -> Result<()> {
    init_logging();

    log::info!("NutriZen widget preview starting up...");

    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("nutrizen-widget"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?.settings();
    let store = Arc::new(SqliteStore::open(data_dir.join("preferences.sqlite3"))?);
    if store.get_all()?.is_empty() {
        log::info!("Preferences store is empty, writing sample values");
        seed_sample_data(&store)?;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(async move {
        let bus = SignalBus::new();
        let mut handles = Vec::with_capacity(settings.providers.len());

        for provider in &settings.providers {
            let handle = launch_provider(
                &settings,
                &provider.name,
                store.clone(),
                LogSurface::default(),
                bus.clone(),
            )?;
            let mut reports = handle.reports();
            handle.add_instances(vec![InstanceId(1)])?;
            reports.changed().await?;
            handles.push(handle);
        }

        let listeners = bus.emit(&settings.refresh_action);
        log::info!("Refresh signal delivered to {listeners} provider(s), Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;

        for handle in handles {
            let coordinator = handle.shutdown().await?;
            log::info!(
                "{} provider stopped after {} render(s)",
                coordinator.provider().name,
                coordinator.surface().commits
            );
        }
        Ok::<(), anyhow::Error>(())
    })
}
