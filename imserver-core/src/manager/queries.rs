use super::{global_settings, PluginKey, PluginManager};
use crate::types::{
    HandlerState, PluginDescription, PluginState, SubView, SubViewDescription, SwitchDirection,
};
use std::collections::BTreeMap;

impl PluginManager {
    /// Ids of all loaded plugins in load order
    pub fn loaded_plugin_names(&self) -> Vec<String> {
        self.registry.iter().map(|(_, plugin)| plugin.id.clone()).collect()
    }

    /// Ids of the loaded plugins supporting `state`
    pub fn loaded_plugin_names_for(&self, state: HandlerState) -> Vec<String> {
        self.registry
            .iter()
            .filter(|(_, plugin)| plugin.plugin.supported_states().contains(&state))
            .map(|(_, plugin)| plugin.id.clone())
            .collect()
    }

    /// Names of the plugins supporting `state`; OnScreen plugins carry
    /// their enablement, the others are always enabled
    pub fn plugin_descriptions(&self, state: HandlerState) -> Vec<PluginDescription> {
        self.registry
            .iter()
            .filter(|(_, plugin)| plugin.plugin.supported_states().contains(&state))
            .map(|(_, plugin)| PluginDescription {
                name: plugin.plugin.name().to_string(),
                enabled: state != HandlerState::OnScreen || self.onscreen.is_enabled(&plugin.id),
            })
            .collect()
    }

    /// Ids of the active plugins in activation order
    pub fn active_plugin_names(&self) -> Vec<String> {
        self.active
            .iter()
            .filter_map(|key| self.registry.get(*key))
            .map(|plugin| plugin.id.clone())
            .collect()
    }

    /// Id of the plugin mapped to `state`
    pub fn active_plugin_name(&self, state: HandlerState) -> Option<String> {
        self.handlers
            .get(state)
            .and_then(|key| self.registry.get(key))
            .map(|plugin| plugin.id.clone())
    }

    pub fn plugin_state(&self, plugin_id: &str) -> Option<PluginState> {
        let key = self.registry.find(plugin_id)?;
        self.registry.get(key).map(|plugin| plugin.state.clone())
    }

    pub fn is_active(&self, plugin_id: &str) -> bool {
        self.registry
            .find(plugin_id)
            .map_or(false, |key| self.active.contains(&key))
    }

    /// Subview id to title for one plugin
    pub fn available_subviews(&self, plugin_id: &str, state: HandlerState) -> BTreeMap<String, String> {
        self.registry
            .find(plugin_id)
            .and_then(|key| self.registry.get(key))
            .map(|plugin| {
                plugin
                    .input_method
                    .subviews(state)
                    .into_iter()
                    .map(|subview| (subview.id, subview.title))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every subview offered by a loaded plugin, in load order
    pub fn available_plugins_and_subviews(&self, state: HandlerState) -> Vec<SubView> {
        self.registry
            .iter()
            .flat_map(|(_, plugin)| {
                plugin
                    .input_method
                    .subviews(state)
                    .into_iter()
                    .map(move |subview| SubView::new(plugin.id.clone(), subview.id))
            })
            .collect()
    }

    /// Active subview of the plugin mapped to `state`
    pub fn active_subview(&self, state: HandlerState) -> Option<String> {
        let key = self.handlers.get(state)?;
        self.registry
            .get(key)
            .and_then(|plugin| plugin.input_method.active_subview(state))
    }

    /// Enabled subviews right before and right after the active one
    ///
    /// The candidates are the enabled subviews of the previous enabled
    /// plugin, the current plugin and the next enabled plugin. Empty when
    /// there is nothing to switch to.
    pub fn surrounding_subview_descriptions(&self, state: HandlerState) -> Vec<SubViewDescription> {
        let key = match self.handlers.get(state) {
            Some(key) => key,
            None => return Vec::new(),
        };
        let plugin = match self.registry.get(key) {
            Some(plugin) => plugin,
            None => return Vec::new(),
        };

        let subview_id = plugin.input_method.active_subview(state);
        let subviews = self.enabled_subviews_of(&plugin.id, state);
        if self.registry.len() == 1 && subviews.len() == 1 {
            return Vec::new();
        }

        let mut ring: Vec<SubViewDescription> = Vec::new();
        if let Some(previous) = self.find_enabled_plugin(key, SwitchDirection::Backward, state) {
            ring.extend(self.describe_enabled_subviews(previous, state));
        }
        ring.extend(describe(&plugin.id, &subviews));
        if let Some(next) = self.find_enabled_plugin(key, SwitchDirection::Forward, state) {
            ring.extend(self.describe_enabled_subviews(next, state));
        }

        if ring.len() == 1 {
            return Vec::new();
        }

        let current = match subview_id.and_then(|id| subviews.get_key_value(&id)) {
            Some((id, title)) => SubViewDescription {
                plugin_id: plugin.id.clone(),
                id: id.clone(),
                title: title.clone(),
            },
            None => return Vec::new(),
        };
        let index = match ring.iter().position(|d| *d == current) {
            Some(index) => index,
            None => return Vec::new(),
        };

        let previous = if index > 0 { index - 1 } else { ring.len() - 1 };
        let next = if index + 1 < ring.len() { index + 1 } else { 0 };
        vec![ring[previous].clone(), ring[next].clone()]
    }

    /// Nearest other plugin in `direction` that supports `state`, and for
    /// OnScreen has an enabled subview
    fn find_enabled_plugin(&self, current: PluginKey, direction: SwitchDirection, state: HandlerState) -> Option<PluginKey> {
        let order = self.registry.order();
        let index = order.iter().position(|k| *k == current)?;
        let count = order.len();

        (1..count)
            .map(|step| match direction {
                SwitchDirection::Backward => order[(index + count - step) % count],
                _ => order[(index + step) % count],
            })
            .find(|key| {
                self.registry.get(*key).map_or(false, |plugin| {
                    plugin.plugin.supported_states().contains(&state)
                        && (state != HandlerState::OnScreen || self.onscreen.is_enabled(&plugin.id))
                })
            })
    }

    /// Available subviews of `plugin_id`; OnScreen keeps only enabled ones
    fn enabled_subviews_of(&self, plugin_id: &str, state: HandlerState) -> BTreeMap<String, String> {
        let mut subviews = self.available_subviews(plugin_id, state);
        if state == HandlerState::OnScreen {
            subviews.retain(|id, _| {
                self.onscreen
                    .is_subview_enabled(&SubView::new(plugin_id, id.as_str()))
            });
        }
        subviews
    }

    fn describe_enabled_subviews(&self, key: PluginKey, state: HandlerState) -> Vec<SubViewDescription> {
        match self.registry.get(key) {
            Some(plugin) => describe(&plugin.id, &self.enabled_subviews_of(&plugin.id, state)),
            None => Vec::new(),
        }
    }

    /// Rebuilds the settings descriptions from the loaded plugins
    pub(crate) fn register_settings(&mut self) {
        let subviews: Vec<(SubView, String)> = self
            .registry
            .iter()
            .flat_map(|(_, plugin)| {
                let name = plugin.plugin.name().to_string();
                plugin
                    .input_method
                    .subviews(HandlerState::OnScreen)
                    .into_iter()
                    .map(move |subview| {
                        (
                            SubView::new(plugin.id.clone(), subview.id),
                            format!("{} - {}", name, subview.title),
                        )
                    })
            })
            .collect();

        let loaded = self.loaded_plugin_names();
        self.settings_registry
            .reset(global_settings(&subviews), |id| loaded.iter().any(|l| l == id));
    }
}

fn describe(plugin_id: &str, subviews: &BTreeMap<String, String>) -> Vec<SubViewDescription> {
    subviews
        .iter()
        .map(|(id, title)| SubViewDescription {
            plugin_id: plugin_id.to_string(),
            id: id.clone(),
            title: title.clone(),
        })
        .collect()
}
