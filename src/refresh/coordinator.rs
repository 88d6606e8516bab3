use std::collections::BTreeSet;

use serde::Serialize;

use crate::diagnostics::dump_store;
use crate::render::{render, InstanceId, RenderSurface};
use crate::resolve::resolve_state;
use crate::settings::ProviderSettings;
use crate::state::WidgetState;
use crate::store::KeyValueStore;

use super::listener::{ListenerState, SignalRegistry};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum InstanceOutcome {
    Updated { instance: InstanceId },
    Failed { instance: InstanceId, reason: String },
}

impl InstanceOutcome {
    pub fn instance(&self) -> InstanceId {
        match self {
            InstanceOutcome::Updated { instance } | InstanceOutcome::Failed { instance, .. } => {
                *instance
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, InstanceOutcome::Updated { .. })
    }
}

/// Result of one refresh: the state that was rendered and what happened to each instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub state: WidgetState,
    pub outcomes: Vec<InstanceOutcome>,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Owns the "re-resolve and re-render" operation for one widget provider and
/// the lifecycle of its explicit refresh listener.
///
/// All entry points take `&mut self`, so refreshes driven through one
/// coordinator never overlap.
pub struct RefreshCoordinator<S, R, L> {
    provider: ProviderSettings,
    package_name: String,
    refresh_action: String,
    store: S,
    surface: R,
    registry: L,
    listener: ListenerState,
    instances: BTreeSet<InstanceId>,
}

impl<S, R, L> RefreshCoordinator<S, R, L>
where
    S: KeyValueStore,
    R: RenderSurface,
    L: SignalRegistry,
{
    pub fn new(
        provider: ProviderSettings,
        package_name: impl Into<String>,
        refresh_action: impl Into<String>,
        store: S,
        surface: R,
        registry: L,
    ) -> Self {
        Self {
            provider,
            package_name: package_name.into(),
            refresh_action: refresh_action.into(),
            store,
            surface,
            registry,
            listener: ListenerState::default(),
            instances: BTreeSet::new(),
        }
    }

    pub fn provider(&self) -> &ProviderSettings {
        &self.provider
    }

    pub fn listener(&self) -> &ListenerState {
        &self.listener
    }

    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.iter().copied()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn registry(&self) -> &L {
        &self.registry
    }

    pub fn on_first_instance_created(&mut self) {
        log_debug!("First {} widget created", self.provider.name);
        self.listener
            .register(&mut self.registry, &self.refresh_action);
    }

    pub fn on_last_instance_removed(&mut self) {
        log_debug!("Last {} widget removed", self.provider.name);
        self.listener.unregister(&mut self.registry);
    }

    /// New placements: track them, register the listener on the first one,
    /// and render the new placements right away.
    pub fn on_instances_added(&mut self, ids: &[InstanceId]) -> RefreshReport {
        self.track(ids);
        self.refresh(ids)
    }

    /// Every path that grows the instance set goes through here, so the
    /// listener is registered on the empty to non-empty edge whichever host
    /// callback arrives first.
    fn track(&mut self, ids: &[InstanceId]) {
        let was_empty = self.instances.is_empty();
        self.instances.extend(ids.iter().copied());
        if was_empty && !self.instances.is_empty() {
            self.on_first_instance_created();
        }
    }

    pub fn on_instances_removed(&mut self, ids: &[InstanceId]) {
        let was_empty = self.instances.is_empty();
        for id in ids {
            self.instances.remove(id);
        }
        if !was_empty && self.instances.is_empty() {
            self.on_last_instance_removed();
        }
    }

    /// Host's scheduled update for `ids`.
    pub fn on_periodic_refresh(&mut self, ids: &[InstanceId]) -> RefreshReport {
        log_info!(
            "Periodic update for {} {} widget(s)",
            ids.len(),
            self.provider.name
        );
        self.track(ids);
        self.refresh(ids)
    }

    pub fn on_explicit_refresh_signal(&mut self) -> RefreshReport {
        let ids: Vec<InstanceId> = self.instances.iter().copied().collect();
        log_info!(
            "Explicit refresh for {} {} widget(s)",
            ids.len(),
            self.provider.name
        );
        self.refresh(&ids)
    }

    /// Resolve, validate, then render each instance on its own: a failing
    /// instance is logged and recorded, and the rest still get updated.
    pub fn refresh(&mut self, ids: &[InstanceId]) -> RefreshReport {
        let targets: BTreeSet<InstanceId> = ids.iter().copied().collect();

        dump_store(&self.store, &self.provider.policy);
        let state = resolve_state(&self.store, &self.provider.policy);
        let launch = self.surface.launch_action(&self.package_name);
        if launch.is_none() {
            log_debug!("No launch action for {}, click regions stay inert", self.package_name);
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for instance in targets {
            let widget = render(
                &state,
                instance,
                &self.provider.clickable_regions,
                launch.as_ref(),
            );

            match self.surface.commit(&widget) {
                Ok(()) => {
                    log_debug!("Widget {instance} updated successfully");
                    outcomes.push(InstanceOutcome::Updated { instance });
                }
                Err(err) => {
                    log_error!("Error updating widget {instance}: {err:#}");
                    outcomes.push(InstanceOutcome::Failed {
                        instance,
                        reason: format!("{err:#}"),
                    });
                }
            }
        }

        RefreshReport { state, outcomes }
    }
}
