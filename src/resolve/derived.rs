use crate::state::{RawFieldSet, DEFAULT_GOAL};
use crate::store::KeyValueStore;

use super::policy::ResolutionPolicy;
use super::resolver::resolve;

/// Share of `goal` reached by `consumed`, rounded half up and capped at 100.
/// A non-positive goal yields 0.
pub fn derive_percentage(consumed: i64, goal: i64) -> i64 {
    if goal <= 0 {
        return 0;
    }
    let ratio = consumed as f64 * 100.0 / goal as f64;
    let rounded = (ratio + 0.5).floor() as i64;
    rounded.min(100)
}

/// Resolves a store that only persists consumed/goal and fills the percentage
/// from them. Unset values count as 0 consumed and the default goal, the same
/// defaults the producer's readers use.
pub fn resolve_derived<S: KeyValueStore + ?Sized>(
    store: &S,
    policy: &ResolutionPolicy,
) -> RawFieldSet {
    let mut raw = resolve(store, policy);
    let consumed = raw.consumed.unwrap_or(0);
    let goal = raw.goal.unwrap_or(DEFAULT_GOAL);
    raw.percentage = Some(derive_percentage(consumed, goal));
    raw
}
