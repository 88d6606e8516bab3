use serde::{Deserialize, Serialize};

/// Goal shown when none is configured.
pub const DEFAULT_GOAL: i64 = 2000;

/// Shown in place of the update time when the producer never wrote one.
pub const LAST_UPDATED_PLACEHOLDER: &str = "--:--";

/// Fields as found in the store during one resolution pass. Each field holds the
/// first usable value seen and is never overwritten within the pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFieldSet {
    pub percentage: Option<i64>,
    pub consumed: Option<i64>,
    pub goal: Option<i64>,
    pub last_updated: Option<String>,
}

impl RawFieldSet {
    pub fn is_empty(&self) -> bool {
        self.percentage.is_none()
            && self.consumed.is_none()
            && self.goal.is_none()
            && self.last_updated.is_none()
    }
}

/// Validated widget values. Built fresh on every refresh and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    percentage: u8,
    consumed: i64,
    goal: i64,
    last_updated: String,
}

impl WidgetState {
    /// Only the validator builds states, which keeps the invariants
    /// (`percentage <= 100`, `consumed >= 0`, `goal > 0`, non-empty timestamp) in one place.
    pub(crate) fn new(percentage: u8, consumed: i64, goal: i64, last_updated: String) -> Self {
        debug_assert!(percentage <= 100);
        debug_assert!(consumed >= 0);
        debug_assert!(goal > 0);
        debug_assert!(!last_updated.is_empty());
        Self {
            percentage,
            consumed,
            goal,
            last_updated,
        }
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn consumed(&self) -> i64 {
        self.consumed
    }

    pub fn goal(&self) -> i64 {
        self.goal
    }

    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::new(0, 0, DEFAULT_GOAL, LAST_UPDATED_PLACEHOLDER.to_string())
    }
}
