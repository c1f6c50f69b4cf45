use super::{PluginKey, PluginManager};
use crate::settings::keys;
use crate::types::HandlerState;
use serde_json::Value;
use std::collections::BTreeMap;

/// Which plugin serves which handler state
///
/// Holds at most one plugin per state.
#[derive(Debug, Default, Clone)]
pub struct HandlerMap {
    entries: BTreeMap<HandlerState, PluginKey>,
}

impl HandlerMap {
    pub fn get(&self, state: HandlerState) -> Option<PluginKey> {
        self.entries.get(&state).copied()
    }

    pub fn set(&mut self, state: HandlerState, key: PluginKey) {
        self.entries.insert(state, key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// States served by `key`
    pub fn states_of(&self, key: PluginKey) -> Vec<HandlerState> {
        self.entries
            .iter()
            .filter(|(_, k)| **k == key)
            .map(|(state, _)| *state)
            .collect()
    }

    /// Drops every entry of `key` and returns the states it served
    pub fn remove_plugin(&mut self, key: PluginKey) -> Vec<HandlerState> {
        let states = self.states_of(key);
        self.entries.retain(|_, k| *k != key);
        states
    }
}

impl PluginManager {
    /// Reads the persisted Hardware and Accessory assignments
    pub(crate) fn load_handler_map(&mut self) {
        self.handlers.clear();
        let entries = self.settings.list_entries(keys::PLUGIN_ROOT);

        for state in [HandlerState::Hardware, HandlerState::Accessory] {
            let key = match state.setting_name() {
                Some(name) => keys::handler(name),
                None => continue,
            };
            if !entries.contains(&key) {
                continue;
            }

            let plugin_id = self.settings.string_value(&key).unwrap_or_default();
            match self.registry.find(&plugin_id) {
                Some(plugin) => self.handlers.set(state, plugin),
                None => log::warn!("Could not find plugin: {}", plugin_id),
            }
        }
    }

    /// Plugin id serving `state`
    pub fn resolve(&self, state: HandlerState) -> Option<&str> {
        self.handlers
            .get(state)
            .and_then(|key| self.registry.get(key))
            .map(|plugin| plugin.id.as_str())
    }

    /// Assigns `plugin_id` to `state`; true when it serves the state afterwards
    ///
    /// For OnScreen the first enabled subview of the plugin becomes the
    /// active subview.
    pub fn set_active_plugin(&mut self, plugin_id: &str, state: HandlerState) -> bool {
        let name = match state.setting_name() {
            Some(name) => name,
            None => {
                let first = self.onscreen.enabled_subviews(plugin_id).into_iter().next();
                let subview = match first {
                    Some(subview) => subview,
                    None => {
                        log::warn!("{} has no enabled subviews", plugin_id);
                        return false;
                    }
                };
                self.onscreen
                    .set_active_subview(subview, self.settings.as_mut());
                // the plugin may be mapped already without being active
                self.on_screen_subview_changed();
                return self.resolve(state) == Some(plugin_id);
            }
        };

        if plugin_id.is_empty() || self.registry.find(plugin_id).is_none() {
            log::warn!("Could not find plugin: {}", plugin_id);
            return false;
        }

        let key = keys::handler(name);
        if self.settings.string_value(&key).as_deref() != Some(plugin_id) {
            self.persist_handler(state, plugin_id);
        }
        self.reconcile(state);
        self.resolve(state) == Some(plugin_id)
    }

    /// Brings the runtime assignment of `state` in line with its setting
    ///
    /// Does nothing when both already agree, so writes made by the manager
    /// itself never trigger a second switch.
    pub fn reconcile(&mut self, state: HandlerState) {
        let name = match state.setting_name() {
            Some(name) => name,
            None => return self.on_screen_subview_changed(),
        };

        let plugin_id = match self.settings.string_value(&keys::handler(name)) {
            Some(plugin_id) => plugin_id,
            None => return,
        };

        let current = self.handlers.get(state);
        let current_id = current
            .and_then(|key| self.registry.get(key))
            .map(|plugin| plugin.id.clone());
        if current_id.as_deref() == Some(plugin_id.as_str()) {
            return;
        }

        let replacement = match self.registry.find(&plugin_id) {
            Some(key) => key,
            None => {
                log::warn!("Could not find plugin: {}", plugin_id);
                return;
            }
        };

        let supported = self
            .registry
            .get(replacement)
            .map_or(false, |plugin| plugin.plugin.supported_states().contains(&state));
        if !supported {
            log::warn!("{} does not support {} input", plugin_id, state);
            self.restore_handler_setting(state, current_id.as_deref());
            return;
        }

        let source = current.filter(|key| self.active.contains(key));
        match source {
            Some(source) if !self.active.contains(&replacement) => {
                if !self.switch_to_key(replacement, Some(source), None) {
                    log::info!("switching to plugin: {} failed", plugin_id);
                    self.restore_handler_setting(state, current_id.as_deref());
                }
            }
            _ => {
                self.handlers.set(state, replacement);
                if self.requested_handlers.contains(&state) {
                    let requested = self.requested_handlers.clone();
                    self.set_active_handlers(&requested);
                }
            }
        }
    }

    pub(crate) fn persist_handler(&mut self, state: HandlerState, plugin_id: &str) {
        if let Some(name) = state.setting_name() {
            if let Err(e) = self
                .settings
                .set(&keys::handler(name), Value::String(plugin_id.to_string()))
            {
                log::warn!("Could not persist {} handler: {}", state, e);
            }
        }
    }

    fn restore_handler_setting(&mut self, state: HandlerState, plugin_id: Option<&str>) {
        match (plugin_id, state.setting_name()) {
            (Some(plugin_id), _) => self.persist_handler(state, plugin_id),
            (None, Some(name)) => {
                if let Err(e) = self.settings.unset(&keys::handler(name)) {
                    log::warn!("Could not reset {} handler: {}", state, e);
                }
            }
            (None, None) => {}
        }
    }
}
