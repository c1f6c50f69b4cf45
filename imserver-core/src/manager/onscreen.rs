use crate::settings::{keys, SettingsBackend};
use crate::types::SubView;
use serde_json::Value;

/// Available, enabled and active on-screen subviews
///
/// Enabled and active subviews are persisted; every write goes through
/// the settings backend, whose change notification then finds the
/// in-memory copy already up to date.
#[derive(Debug, Default)]
pub struct OnScreenPlugins {
    available: Vec<SubView>,
    enabled: Vec<SubView>,
    active: Option<SubView>,
    all_enabled: bool,
}

impl OnScreenPlugins {
    pub fn load(settings: &dyn SettingsBackend) -> Self {
        let mut plugins = Self::default();
        plugins.enabled = read_enabled(settings);
        plugins.active = read_active(settings);
        plugins
    }

    pub fn available(&self) -> &[SubView] {
        &self.available
    }

    /// Enabled subviews, all available ones while the override is set
    pub fn enabled(&self) -> &[SubView] {
        if self.all_enabled {
            &self.available
        } else {
            &self.enabled
        }
    }

    pub fn active_subview(&self) -> Option<&SubView> {
        self.active.as_ref()
    }

    pub fn is_enabled(&self, plugin_id: &str) -> bool {
        self.enabled().iter().any(|s| s.plugin == plugin_id)
    }

    pub fn is_subview_enabled(&self, subview: &SubView) -> bool {
        self.enabled().contains(subview)
    }

    pub fn enabled_subviews(&self, plugin_id: &str) -> Vec<SubView> {
        self.enabled()
            .iter()
            .filter(|s| s.plugin == plugin_id)
            .cloned()
            .collect()
    }

    /// Returns true when the active subview changed
    pub fn set_active_subview(&mut self, subview: SubView, settings: &mut dyn SettingsBackend) -> bool {
        if self.active.as_ref() == Some(&subview) {
            return false;
        }
        if let Err(e) = settings.set(keys::ONSCREEN_ACTIVE, Value::String(subview.to_string())) {
            log::warn!("Could not persist active subview {}: {}", subview, e);
        }
        self.active = Some(subview);
        true
    }

    pub fn set_enabled_subviews(&mut self, enabled: Vec<SubView>, settings: &mut dyn SettingsBackend) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        let value = Value::Array(
            self.enabled
                .iter()
                .map(|s| Value::String(s.to_string()))
                .collect(),
        );
        if let Err(e) = settings.set(keys::ONSCREEN_ENABLED, value) {
            log::warn!("Could not persist enabled subviews: {}", e);
        }
    }

    /// Returns true when the override changed
    pub fn set_all_subviews_enabled(&mut self, enable: bool) -> bool {
        let changed = self.all_enabled != enable;
        self.all_enabled = enable;
        changed
    }

    /// Takes the subviews offered by the loaded plugins
    ///
    /// Enabled subviews no longer available are dropped and when nothing
    /// stays enabled the first available subview is enabled. Returns true
    /// when the active subview had to change.
    pub fn update_available_subviews(&mut self, available: Vec<SubView>, settings: &mut dyn SettingsBackend) -> bool {
        self.available = available;

        let mut enabled: Vec<SubView> = self
            .enabled
            .iter()
            .filter(|s| self.available.contains(s))
            .cloned()
            .collect();
        if enabled.is_empty() {
            enabled.extend(self.available.first().cloned());
        }
        self.set_enabled_subviews(enabled, settings);
        self.ensure_active_enabled(settings)
    }

    /// Replaces an active subview that is not enabled by the first enabled
    /// one; returns true when it did
    pub fn ensure_active_enabled(&mut self, settings: &mut dyn SettingsBackend) -> bool {
        let active_ok = self
            .active
            .as_ref()
            .map_or(false, |active| self.is_subview_enabled(active));
        if active_ok {
            return false;
        }
        match self.enabled().first().cloned() {
            Some(first) => self.set_active_subview(first, settings),
            None => false,
        }
    }

    /// Picks up an external change of `key`; returns true when it differs
    pub fn reload(&mut self, key: &str, settings: &dyn SettingsBackend) -> bool {
        match key {
            keys::ONSCREEN_ACTIVE => {
                let active = read_active(settings);
                let changed = active != self.active;
                self.active = active;
                changed
            }
            keys::ONSCREEN_ENABLED => {
                let enabled = read_enabled(settings);
                let changed = enabled != self.enabled;
                self.enabled = enabled;
                changed
            }
            _ => false,
        }
    }
}

fn read_enabled(settings: &dyn SettingsBackend) -> Vec<SubView> {
    settings
        .string_list(keys::ONSCREEN_ENABLED)
        .unwrap_or_default()
        .iter()
        .filter_map(|s| SubView::parse(s))
        .collect()
}

fn read_active(settings: &dyn SettingsBackend) -> Option<SubView> {
    settings
        .string_value(keys::ONSCREEN_ACTIVE)
        .and_then(|s| SubView::parse(&s))
}
