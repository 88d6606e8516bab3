//! Store dump written to the log before each refresh, so a widget stuck on
//! defaults can be traced to the keys the producer actually wrote.

use serde::Serialize;

use crate::resolve::ResolutionPolicy;
use crate::store::{KeyValueStore, StoreValue};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedKey {
    pub prefix: String,
    pub key: String,
    pub value: Option<StoreValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDump {
    /// Every entry, sorted by key.
    pub entries: Vec<(String, StoreValue)>,
    /// Every prefix × suffix the policy may read, with its value if present.
    pub expected: Vec<ExpectedKey>,
}

impl StoreDump {
    pub fn found_count(&self) -> usize {
        self.expected.iter().filter(|key| key.value.is_some()).count()
    }
}

pub fn dump_store<S: KeyValueStore + ?Sized>(store: &S, policy: &ResolutionPolicy) -> StoreDump {
    let all = match store.get_all() {
        Ok(all) => all,
        Err(err) => {
            log_error!("Error dumping preferences: {err}");
            return StoreDump::default();
        }
    };

    log_debug!("===== PREFERENCES DUMP =====");
    if all.is_empty() {
        log_warn!("No preferences found in store");
    }
    for (key, value) in &all {
        log_debug!("  {key} = {value}");
    }

    let mut expected = Vec::new();
    for prefix in &policy.prefixes {
        log_debug!("  prefix '{prefix}':");
        for spec in &policy.fields {
            let key = format!("{prefix}{}", spec.suffix);
            let value = all.get(&key).cloned();
            match &value {
                Some(value) => log_debug!("    {key}: found {value}"),
                None => log_debug!("    {key}: not found"),
            }
            expected.push(ExpectedKey {
                prefix: prefix.clone(),
                key,
                value,
            });
        }
    }
    log_debug!("===== END OF PREFERENCES DUMP =====");

    StoreDump {
        entries: all.into_iter().collect(),
        expected,
    }
}
