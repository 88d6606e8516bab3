use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::refresh::{RefreshCoordinator, RefreshReport, SignalRegistry};
use crate::render::{InstanceId, RenderSurface};
use crate::store::KeyValueStore;

use super::signal::{BroadcastRegistry, SignalBus};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Everything the host delivers to a widget provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    InstancesAdded(Vec<InstanceId>),
    InstancesRemoved(Vec<InstanceId>),
    PeriodicRefresh(Vec<InstanceId>),
    ExplicitRefresh,
}

/// Builder for the provider's event loop. Create it first so the
/// [`BroadcastRegistry`] handed to the coordinator feeds this loop.
pub struct WidgetHost {
    bus: SignalBus,
    action: String,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
}

impl WidgetHost {
    pub fn new(bus: SignalBus, action: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            bus,
            action: action.into(),
            events_tx,
            events_rx,
        }
    }

    pub fn registry(&self) -> BroadcastRegistry {
        BroadcastRegistry::new(self.bus.clone(), self.events_tx.clone())
    }

    /// Start the loop on the current tokio runtime. Events are handled one at
    /// a time, so two refreshes never run concurrently.
    ///
    /// Panics if `period` is zero or when called outside a runtime.
    pub fn spawn<S, R, L>(
        self,
        coordinator: RefreshCoordinator<S, R, L>,
        period: Duration,
    ) -> HostHandle<S, R, L>
    where
        S: KeyValueStore + Send + 'static,
        R: RenderSurface + Send + 'static,
        L: SignalRegistry + Send + 'static,
    {
        assert!(!period.is_zero(), "widget refresh period must be non-zero");
        let cancel_token = CancellationToken::new();
        let (reports_tx, reports_rx) = watch::channel(None);

        let task = tokio::spawn(host_loop(
            coordinator,
            self.events_rx,
            period,
            cancel_token.clone(),
            reports_tx,
        ));

        HostHandle {
            events: self.events_tx,
            bus: self.bus,
            action: self.action,
            reports: reports_rx,
            cancel_token,
            task,
        }
    }
}

pub struct HostHandle<S, R, L> {
    events: mpsc::UnboundedSender<HostEvent>,
    bus: SignalBus,
    action: String,
    reports: watch::Receiver<Option<RefreshReport>>,
    cancel_token: CancellationToken,
    task: JoinHandle<RefreshCoordinator<S, R, L>>,
}

impl<S, R, L> HostHandle<S, R, L> {
    pub fn add_instances(&self, ids: Vec<InstanceId>) -> Result<()> {
        self.send(HostEvent::InstancesAdded(ids))
    }

    pub fn remove_instances(&self, ids: Vec<InstanceId>) -> Result<()> {
        self.send(HostEvent::InstancesRemoved(ids))
    }

    pub fn periodic_refresh(&self, ids: Vec<InstanceId>) -> Result<()> {
        self.send(HostEvent::PeriodicRefresh(ids))
    }

    /// Emit the explicit refresh signal. Only has an effect while a listener
    /// is registered, i.e. while at least one instance exists.
    pub fn request_refresh(&self) -> usize {
        self.bus.emit(&self.action)
    }

    /// Latest refresh report, updated after every refresh the loop runs.
    pub fn reports(&self) -> watch::Receiver<Option<RefreshReport>> {
        self.reports.clone()
    }

    /// Stop the loop and hand the coordinator back.
    pub async fn shutdown(mut self) -> Result<RefreshCoordinator<S, R, L>> {
        self.cancel_token.cancel();
        (&mut self.task)
            .await
            .context("widget host task failed to join")
    }

    fn send(&self, event: HostEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("widget host loop is no longer running"))
    }
}

impl<S, R, L> Drop for HostHandle<S, R, L> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn host_loop<S, R, L>(
    mut coordinator: RefreshCoordinator<S, R, L>,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
    period: Duration,
    cancel_token: CancellationToken,
    reports: watch::Sender<Option<RefreshReport>>,
) -> RefreshCoordinator<S, R, L>
where
    S: KeyValueStore,
    R: RenderSurface,
    L: SignalRegistry,
{
    // First scheduled update one period after start; placements get rendered when added.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "Widget host for {} started (period {}s)",
        coordinator.provider().name,
        period.as_secs()
    );

    loop {
        // Queued events are drained before a pending shutdown is honored.
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                if let Some(report) = dispatch(&mut coordinator, event) {
                    reports.send_replace(Some(report));
                }
            }
            _ = ticker.tick() => {
                let ids: Vec<InstanceId> = coordinator.instances().collect();
                if ids.is_empty() {
                    log_debug!("Periodic tick with no widgets placed");
                    continue;
                }
                let report = coordinator.on_periodic_refresh(&ids);
                reports.send_replace(Some(report));
            }
            _ = cancel_token.cancelled() => {
                log_info!("Widget host for {} shutting down", coordinator.provider().name);
                break;
            }
        }
    }

    coordinator
}

fn dispatch<S, R, L>(
    coordinator: &mut RefreshCoordinator<S, R, L>,
    event: HostEvent,
) -> Option<RefreshReport>
where
    S: KeyValueStore,
    R: RenderSurface,
    L: SignalRegistry,
{
    match event {
        HostEvent::InstancesAdded(ids) => Some(coordinator.on_instances_added(&ids)),
        HostEvent::InstancesRemoved(ids) => {
            coordinator.on_instances_removed(&ids);
            None
        }
        HostEvent::PeriodicRefresh(ids) => Some(coordinator.on_periodic_refresh(&ids)),
        HostEvent::ExplicitRefresh => Some(coordinator.on_explicit_refresh_signal()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::refresh::coordinator::testing::RecordingSurface;
    use crate::refresh::ACTION_WIDGET_UPDATE;
    use crate::settings::ProviderSettings;
    use crate::store::{MemoryStore, StoreValue};

    type Handle = HostHandle<Arc<MemoryStore>, RecordingSurface, BroadcastRegistry>;

    fn start(store: Arc<MemoryStore>, failing: &[InstanceId]) -> Handle {
        let host = WidgetHost::new(SignalBus::new(), ACTION_WIDGET_UPDATE);
        let surface = RecordingSurface {
            failing: failing.iter().copied().collect::<HashSet<_>>(),
            ..Default::default()
        };
        let coordinator = RefreshCoordinator::new(
            ProviderSettings::calories(),
            "com.rexa.nutrizenai",
            ACTION_WIDGET_UPDATE,
            store,
            surface,
            host.registry(),
        );
        host.spawn(coordinator, Duration::from_secs(1800))
    }

    async fn next_report(reports: &mut watch::Receiver<Option<RefreshReport>>) -> RefreshReport {
        tokio::time::timeout(Duration::from_secs(1), reports.changed())
            .await
            .expect("refresh did not happen in time")
            .unwrap();
        reports.borrow_and_update().clone().unwrap()
    }

    #[tokio::test]
    async fn explicit_signal_refreshes_placed_widgets() {
        let store = Arc::new(MemoryStore::new());
        let handle = start(store.clone(), &[]);
        let mut reports = handle.reports();

        handle
            .add_instances(vec![InstanceId(1), InstanceId(2)])
            .unwrap();
        let added = next_report(&mut reports).await;
        assert_eq!(added.state.percentage(), 0);

        store.insert("flutter.appWidgetCaloriesPercent", StoreValue::Long(64));
        assert_eq!(handle.request_refresh(), 1);
        let refreshed = next_report(&mut reports).await;
        assert_eq!(refreshed.state.percentage(), 64);
        assert_eq!(refreshed.succeeded(), 2);

        let coordinator = handle.shutdown().await.unwrap();
        assert_eq!(coordinator.surface().committed.len(), 4);
        assert!(coordinator.listener().is_registered());
    }

    #[tokio::test]
    async fn listener_is_released_with_last_widget() {
        let handle = start(Arc::new(MemoryStore::new()), &[]);
        let mut reports = handle.reports();

        handle.add_instances(vec![InstanceId(3)]).unwrap();
        next_report(&mut reports).await;
        handle.remove_instances(vec![InstanceId(3)]).unwrap();

        let coordinator = handle.shutdown().await.unwrap();
        assert!(!coordinator.listener().is_registered());
        assert_eq!(coordinator.registry().active_listeners(), 0);
    }

    #[tokio::test]
    async fn periodic_refresh_isolates_failures() {
        let store = Arc::new(MemoryStore::from_entries([(
            "appWidgetCaloriesConsumed",
            StoreValue::Int(1200),
        )]));
        let handle = start(store, &[InstanceId(2)]);
        let mut reports = handle.reports();

        handle
            .periodic_refresh(vec![InstanceId(1), InstanceId(2), InstanceId(3)])
            .unwrap();
        let report = next_report(&mut reports).await;
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);

        let coordinator = handle.shutdown().await.unwrap();
        assert!(coordinator
            .surface()
            .committed
            .iter()
            .all(|widget| widget.view.amount_text == "1200 / 2000 kcal"));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_refreshes_known_widgets() {
        let handle = start(Arc::new(MemoryStore::new()), &[]);
        let mut reports = handle.reports();

        handle.add_instances(vec![InstanceId(8)]).unwrap();
        next_report(&mut reports).await;

        time::advance(Duration::from_secs(1801)).await;
        let report = next_report(&mut reports).await;
        assert_eq!(report.outcomes.len(), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_loop() {
        let handle = start(Arc::new(MemoryStore::new()), &[]);
        let events = handle.events.clone();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), events.closed())
            .await
            .expect("host loop kept running");
    }

    #[tokio::test]
    async fn events_after_shutdown_are_rejected() {
        let handle = start(Arc::new(MemoryStore::new()), &[]);
        let events = handle.events.clone();
        handle.shutdown().await.unwrap();

        assert!(events.send(HostEvent::ExplicitRefresh).is_err());
    }
}
