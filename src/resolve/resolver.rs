use crate::state::RawFieldSet;
use crate::store::{KeyValueStore, StoreError};

use super::policy::{Field, FieldSpec, NumericDecode, ResolutionPolicy};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// Outcome of looking a single key up.
enum Lookup<T> {
    Found(T),
    /// Absent, empty, or not decodable with any configured strategy.
    Miss,
}

/// Collects the raw field values from `store`.
///
/// Prefixes are tried in policy order and the first usable value for a field
/// wins, even when a later prefix holds a more recent write. Never fails: an
/// empty store produces an empty [`RawFieldSet`].
pub fn resolve<S: KeyValueStore + ?Sized>(store: &S, policy: &ResolutionPolicy) -> RawFieldSet {
    let mut raw = RawFieldSet::default();

    for prefix in &policy.prefixes {
        if all_set(&raw, policy) {
            break;
        }

        for spec in &policy.fields {
            if is_set(&raw, spec.field) {
                continue;
            }

            let key = format!("{prefix}{}", spec.suffix);
            if !store.contains(&key) {
                continue;
            }

            if spec.field.is_numeric() {
                if let Lookup::Found(value) = decode_numeric(store, &key, spec) {
                    log_debug!(
                        "Found {} with prefix '{}': {}",
                        spec.field.as_str(),
                        prefix,
                        value
                    );
                    set_numeric(&mut raw, spec.field, value);
                }
            } else if let Lookup::Found(value) = read_text(store, &key) {
                log_debug!(
                    "Found {} with prefix '{}': {}",
                    spec.field.as_str(),
                    prefix,
                    value
                );
                raw.last_updated = Some(value);
            }
        }
    }

    raw
}

fn decode_numeric<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    spec: &FieldSpec,
) -> Lookup<i64> {
    for strategy in &spec.decode_order {
        let decoded = match strategy {
            NumericDecode::Int64 => store.get_i64(key, 0),
            NumericDecode::Int32 => store.get_i32(key, 0).map(i64::from),
        };

        match decoded {
            Ok(value) => return Lookup::Found(value),
            Err(StoreError::TypeMismatch { found, .. }) => {
                log_debug!("{key} is not {strategy:?} (stored as {found}), trying next decoding");
            }
            Err(err) => {
                log_error!("Error reading {key}: {err}");
                return Lookup::Miss;
            }
        }
    }

    Lookup::Miss
}

fn read_text<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Lookup<String> {
    match store.get_string(key, "") {
        Ok(value) if !value.is_empty() => Lookup::Found(value),
        Ok(_) => Lookup::Miss,
        Err(StoreError::TypeMismatch { found, .. }) => {
            log_debug!("{key} is not text (stored as {found}), skipping");
            Lookup::Miss
        }
        Err(err) => {
            log_error!("Error reading {key}: {err}");
            Lookup::Miss
        }
    }
}

fn is_set(raw: &RawFieldSet, field: Field) -> bool {
    match field {
        Field::Percentage => raw.percentage.is_some(),
        Field::Consumed => raw.consumed.is_some(),
        Field::Goal => raw.goal.is_some(),
        Field::LastUpdated => raw.last_updated.is_some(),
    }
}

fn all_set(raw: &RawFieldSet, policy: &ResolutionPolicy) -> bool {
    policy.fields.iter().all(|spec| is_set(raw, spec.field))
}

fn set_numeric(raw: &mut RawFieldSet, field: Field, value: i64) {
    let slot = match field {
        Field::Percentage => &mut raw.percentage,
        Field::Consumed => &mut raw.consumed,
        Field::Goal => &mut raw.goal,
        Field::LastUpdated => return,
    };
    if slot.is_none() {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;
    use crate::store::{MemoryStore, StoreResult, StoreValue};

    fn store(entries: &[(&str, StoreValue)]) -> MemoryStore {
        MemoryStore::from_entries(entries.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn empty_store_leaves_every_field_unset() {
        let raw = resolve(&MemoryStore::new(), &ResolutionPolicy::calories());
        assert!(raw.is_empty());
    }

    #[test]
    fn mixed_prefixes_and_encodings_resolve() {
        let store = store(&[
            ("flutter.appWidgetCaloriesPercent", StoreValue::Long(45)),
            ("appWidgetCaloriesConsumed", StoreValue::Int(900)),
            ("flutter.appWidgetCaloriesGoal", StoreValue::Long(1800)),
            ("appWidgetLastUpdated", StoreValue::String("08:30".into())),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(
            raw,
            RawFieldSet {
                percentage: Some(45),
                consumed: Some(900),
                goal: Some(1800),
                last_updated: Some("08:30".into()),
            }
        );
    }

    #[test]
    fn earlier_prefix_wins_over_later_one() {
        let store = store(&[
            ("flutter.flutter.appWidgetCaloriesGoal", StoreValue::Long(2500)),
            ("appWidgetCaloriesGoal", StoreValue::Long(2200)),
            ("flutter.appWidgetCaloriesGoal", StoreValue::Long(1800)),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.goal, Some(1800));
    }

    #[test]
    fn zero_counts_as_found() {
        let store = store(&[
            ("flutter.appWidgetCaloriesConsumed", StoreValue::Long(0)),
            ("appWidgetCaloriesConsumed", StoreValue::Long(640)),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.consumed, Some(0));
    }

    #[test]
    fn undecodable_value_falls_through_to_next_prefix() {
        let store = store(&[
            ("flutter.appWidgetCaloriesPercent", StoreValue::String("45".into())),
            ("appWidgetCaloriesPercent", StoreValue::Int(30)),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.percentage, Some(30));
    }

    #[test]
    fn empty_text_falls_through_to_next_prefix() {
        let store = store(&[
            ("flutter.appWidgetLastUpdated", StoreValue::String(String::new())),
            ("flutter.flutter.appWidgetLastUpdated", StoreValue::String("19:45".into())),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.last_updated.as_deref(), Some("19:45"));
    }

    #[test]
    fn numeric_timestamp_falls_through_to_next_prefix() {
        let store = store(&[
            ("flutter.appWidgetLastUpdated", StoreValue::Long(1230)),
            ("appWidgetLastUpdated", StoreValue::String("12:30".into())),
        ]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.last_updated.as_deref(), Some("12:30"));
    }

    #[test]
    fn numeric_timestamp_alone_leaves_field_unset() {
        let store = store(&[("flutter.appWidgetLastUpdated", StoreValue::Int(930))]);

        let raw = resolve(&store, &ResolutionPolicy::calories());
        assert_eq!(raw.last_updated, None);
    }

    /// Records every key the resolver asks about.
    struct Probe {
        inner: MemoryStore,
        asked: RefCell<Vec<String>>,
    }

    impl KeyValueStore for Probe {
        fn contains(&self, key: &str) -> bool {
            self.asked.borrow_mut().push(key.to_string());
            self.inner.contains(key)
        }

        fn get_i64(&self, key: &str, default: i64) -> StoreResult<i64> {
            self.inner.get_i64(key, default)
        }

        fn get_i32(&self, key: &str, default: i32) -> StoreResult<i32> {
            self.inner.get_i32(key, default)
        }

        fn get_string(&self, key: &str, default: &str) -> StoreResult<String> {
            self.inner.get_string(key, default)
        }

        fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
            self.inner.get_all()
        }
    }

    #[test]
    fn stops_scanning_once_every_field_is_set() {
        let probe = Probe {
            inner: store(&[
                ("flutter.appWidgetCaloriesPercent", StoreValue::Long(10)),
                ("flutter.appWidgetCaloriesConsumed", StoreValue::Long(200)),
                ("flutter.appWidgetCaloriesGoal", StoreValue::Long(2000)),
                ("flutter.appWidgetLastUpdated", StoreValue::String("07:00".into())),
            ]),
            asked: RefCell::new(Vec::new()),
        };

        resolve(&probe, &ResolutionPolicy::calories());
        let asked = probe.asked.borrow();
        assert_eq!(asked.len(), 4);
        assert!(asked.iter().all(|key| key.starts_with("flutter.")));
    }

    /// Fails every read to exercise the backend error path.
    struct Broken;

    impl KeyValueStore for Broken {
        fn contains(&self, _key: &str) -> bool {
            true
        }

        fn get_i64(&self, _key: &str, _default: i64) -> StoreResult<i64> {
            Err(StoreError::Backend("disk I/O error".into()))
        }

        fn get_i32(&self, _key: &str, _default: i32) -> StoreResult<i32> {
            Err(StoreError::Backend("disk I/O error".into()))
        }

        fn get_string(&self, _key: &str, _default: &str) -> StoreResult<String> {
            Err(StoreError::Backend("disk I/O error".into()))
        }

        fn get_all(&self) -> StoreResult<BTreeMap<String, StoreValue>> {
            Err(StoreError::Backend("disk I/O error".into()))
        }
    }

    #[test]
    fn backend_errors_never_escape() {
        let raw = resolve(&Broken, &ResolutionPolicy::calories());
        assert!(raw.is_empty());
    }
}
