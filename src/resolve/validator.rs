use crate::state::{RawFieldSet, WidgetState, DEFAULT_GOAL, LAST_UPDATED_PLACEHOLDER};

/// Turns a raw field set into a well-formed state, defaulting each field on its own.
///
/// An out-of-range percentage is treated as garbage and reset to 0 rather than
/// clamped to the nearest bound. Fields are not cross-checked: a percentage that
/// disagrees with `consumed / goal` is kept as is.
pub fn normalize(raw: &RawFieldSet) -> WidgetState {
    let percentage = raw
        .percentage
        .and_then(|value| u8::try_from(value).ok())
        .filter(|value| *value <= 100)
        .unwrap_or(0);

    let consumed = raw.consumed.filter(|value| *value >= 0).unwrap_or(0);

    let goal = raw.goal.filter(|value| *value > 0).unwrap_or(DEFAULT_GOAL);

    let last_updated = raw
        .last_updated
        .as_deref()
        .filter(|value| !value.is_empty())
        .unwrap_or(LAST_UPDATED_PLACEHOLDER)
        .to_string();

    WidgetState::new(percentage, consumed, goal, last_updated)
}
