use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::state::WidgetState;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Host-assigned handle of one on-screen placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub i32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const PROGRESS_MAX: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub percentage_text: String,
    pub progress: u8,
    pub progress_max: u8,
    pub amount_text: String,
    pub timestamp_text: String,
}

impl From<&WidgetState> for ViewModel {
    fn from(state: &WidgetState) -> Self {
        Self {
            percentage_text: format!("{}%", state.percentage()),
            progress: state.percentage(),
            progress_max: PROGRESS_MAX,
            amount_text: format!("{} / {} kcal", state.consumed(), state.goal()),
            timestamp_text: format!("Updated: {}", state.last_updated()),
        }
    }
}

/// Opaque "open the host app" action, as resolved by the host for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAction {
    pub package: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickBinding {
    pub region: String,
    pub action: LaunchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedWidget {
    pub instance: InstanceId,
    pub view: ViewModel,
    pub bindings: Vec<ClickBinding>,
}

/// The host's drawing side. Commits are one-way; a failed commit only affects
/// that instance.
pub trait RenderSurface {
    /// Launch action for `package`, or `None` when the host can't launch it.
    fn launch_action(&self, package: &str) -> Option<LaunchAction>;

    fn commit(&mut self, widget: &RenderedWidget) -> Result<()>;
}

/// Surface that writes each committed widget to the log as JSON. Used by the
/// preview runner in place of a real home screen.
#[derive(Debug, Default)]
pub struct LogSurface {
    pub commits: usize,
}

impl RenderSurface for LogSurface {
    fn launch_action(&self, package: &str) -> Option<LaunchAction> {
        Some(LaunchAction {
            package: package.to_string(),
        })
    }

    fn commit(&mut self, widget: &RenderedWidget) -> Result<()> {
        let json = serde_json::to_string(widget)?;
        log_info!("Widget {} rendered: {json}", widget.instance);
        self.commits += 1;
        Ok(())
    }
}

/// Projects `state` onto one instance. Every region is bound to the same
/// launch action; without one, regions stay inert.
pub fn render(
    state: &WidgetState,
    instance: InstanceId,
    regions: &[String],
    launch: Option<&LaunchAction>,
) -> RenderedWidget {
    let bindings = match launch {
        Some(action) => regions
            .iter()
            .map(|region| ClickBinding {
                region: region.clone(),
                action: action.clone(),
            })
            .collect(),
        None => Vec::new(),
    };

    RenderedWidget {
        instance,
        view: ViewModel::from(state),
        bindings,
    }
}
