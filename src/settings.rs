use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::refresh::ACTION_WIDGET_UPDATE;
use crate::resolve::ResolutionPolicy;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Host callbacks are rate-limited to every 30 minutes, so shorter periods buy nothing.
pub const DEFAULT_REFRESH_PERIOD_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub name: String,
    pub policy: ResolutionPolicy,
    #[serde(default)]
    pub clickable_regions: Vec<String>,
}

impl ProviderSettings {
    pub fn calories() -> Self {
        Self {
            name: "calories".into(),
            policy: ResolutionPolicy::calories(),
            clickable_regions: vec!["refresh_button".into(), "calories_text".into()],
        }
    }

    pub fn nutrition() -> Self {
        Self {
            name: "nutrition".into(),
            policy: ResolutionPolicy::nutrition(),
            clickable_regions: vec!["refresh_button".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetSettings {
    /// Package the click regions launch.
    pub package_name: String,
    pub refresh_action: String,
    pub refresh_period_secs: u64,
    pub providers: Vec<ProviderSettings>,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            package_name: "com.rexa.nutrizenai".into(),
            refresh_action: ACTION_WIDGET_UPDATE.into(),
            refresh_period_secs: DEFAULT_REFRESH_PERIOD_SECS,
            providers: vec![ProviderSettings::calories(), ProviderSettings::nutrition()],
        }
    }
}

impl WidgetSettings {
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_period_secs == 0 {
            anyhow::bail!("refresh_period_secs must be greater than zero");
        }
        for provider in &self.providers {
            provider
                .policy
                .validate()
                .with_context(|| format!("invalid policy for provider {}", provider.name))?;
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<WidgetSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<WidgetSettings>(&contents)
                .map_err(anyhow::Error::from)
                .and_then(|settings| settings.validate().map(|_| settings))
            {
                Ok(settings) => settings,
                Err(err) => {
                    log_warn!(
                        "Ignoring settings in {} ({err:#}), using defaults",
                        path.display()
                    );
                    WidgetSettings::default()
                }
            }
        } else {
            WidgetSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> WidgetSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: WidgetSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: WidgetSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &WidgetSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, WidgetSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, WidgetSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolutionVariant;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("widget.json")).unwrap();

        let settings = store.settings();
        assert_eq!(settings, WidgetSettings::default());
        assert_eq!(settings.refresh_period_secs, 1800);
        assert_eq!(
            settings.provider("nutrition").unwrap().policy.variant,
            ResolutionVariant::Derived
        );
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.settings();
        settings.refresh_period_secs = 3600;
        settings.providers.truncate(1);
        store.update(settings.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.settings(), settings);
        reopened.reload().unwrap();
        assert_eq!(reopened.settings().providers.len(), 1);
    }

    #[test]
    fn invalid_update_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("widget.json")).unwrap();

        let mut settings = store.settings();
        settings.providers[0].policy.prefixes.clear();
        assert!(store.update(settings).is_err());
        assert_eq!(store.settings(), WidgetSettings::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.settings(), WidgetSettings::default());
        assert!(store.reload().is_err());
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        fs::write(&path, r#"{ "packageName": "org.example.meals" }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().settings();
        assert_eq!(settings.package_name, "org.example.meals");
        assert_eq!(settings.providers.len(), 2);
    }
}
