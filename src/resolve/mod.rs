pub mod derived;
pub mod policy;
pub mod resolver;
pub mod validator;

pub use derived::{derive_percentage, resolve_derived};
pub use policy::{Field, FieldSpec, NumericDecode, ResolutionPolicy, ResolutionVariant};
pub use resolver::resolve;
pub use validator::normalize;

use crate::state::WidgetState;
use crate::store::KeyValueStore;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// One resolution pass: read the store, then validate.
pub fn resolve_state<S: KeyValueStore + ?Sized>(store: &S, policy: &ResolutionPolicy) -> WidgetState {
    let raw = match policy.variant {
        ResolutionVariant::Precomputed => resolve(store, policy),
        ResolutionVariant::Derived => resolve_derived(store, policy),
    };
    let state = normalize(&raw);

    log_info!(
        "Widget values: {}% | {}/{} kcal | updated {}",
        state.percentage(),
        state.consumed(),
        state.goal(),
        state.last_updated()
    );

    state
}
