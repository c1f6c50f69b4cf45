use super::{PluginKey, PluginManager};
use crate::settings::{keys, SettingsBackend};
use crate::types::{plugin_state, HandlerState, PluginState, SubView, SwitchDirection};
use serde_json::Value;

impl PluginManager {
    pub fn deactivate(&mut self, plugin_id: &str) -> bool {
        match self.registry.find(plugin_id) {
            Some(key) => {
                self.deactivate_plugin(key);
                true
            }
            None => false,
        }
    }

    pub(crate) fn activate_plugin(&mut self, key: PluginKey) {
        if self.active.contains(&key) {
            return;
        }
        let orientation = self.last_orientation;
        if let Some(plugin) = self.registry.get_mut(key) {
            log::info!("Activating plugin {}", plugin.id);
            plugin.host.set_enabled(true);
            plugin
                .input_method
                .handle_app_orientation_changed(orientation);
            self.active.push(key);
        }
    }

    pub(crate) fn deactivate_plugin(&mut self, key: PluginKey) {
        let position = match self.active.iter().position(|k| *k == key) {
            Some(position) => position,
            None => return,
        };
        self.active.remove(position);

        if let Some(plugin) = self.registry.get_mut(key) {
            log::info!("Deactivating plugin {}", plugin.id);
            plugin.input_method.hide();
            plugin.input_method.reset();
            // disabled hosts drop further switch requests
            plugin.host.set_enabled(false);
            plugin.state.clear();
        }
    }

    /// Switches away from `initiator` in `direction`, falling back to a
    /// context switch inside the initiator when no other plugin fits
    pub fn switch_plugin(&mut self, direction: SwitchDirection, initiator_id: &str) -> bool {
        match self.registry.find(initiator_id) {
            Some(initiator) => self.switch_plugin_key(direction, initiator),
            None => {
                log::warn!("{} could not be found", initiator_id);
                false
            }
        }
    }

    pub(crate) fn switch_plugin_key(&mut self, direction: SwitchDirection, initiator: PluginKey) -> bool {
        if self.switch_direction(direction, initiator) {
            return true;
        }
        if let Some(plugin) = self.registry.get_mut(initiator) {
            plugin.input_method.switch_context(direction, true);
        }
        false
    }

    /// Tries the other plugins in ring order, first successful switch wins
    pub(crate) fn switch_direction(&mut self, direction: SwitchDirection, initiator: PluginKey) -> bool {
        if direction == SwitchDirection::Undefined {
            return true;
        }

        let order = self.registry.order().to_vec();
        let index = match order.iter().position(|k| *k == initiator) {
            Some(index) => index,
            None => return false,
        };

        let count = order.len();
        for step in 1..count {
            let candidate = match direction {
                SwitchDirection::Backward => order[(index + count - step) % count],
                _ => order[(index + step) % count],
            };
            if self.try_switch(direction, Some(initiator), candidate, None) {
                return true;
            }
        }
        false
    }

    /// Switches to the plugin `plugin_id` on behalf of `initiator_id`,
    /// optionally selecting one of its on-screen subviews
    ///
    /// Without an initiator the current OnScreen owner hands over.
    pub fn switch_plugin_to(&mut self, plugin_id: &str, initiator_id: Option<&str>, subview: Option<&str>) -> bool {
        let target = match self.registry.find(plugin_id) {
            Some(target) => target,
            None => {
                log::warn!("{} could not be found", plugin_id);
                return false;
            }
        };
        let initiator = match initiator_id {
            Some(id) => match self.registry.find(id) {
                Some(key) => Some(key),
                None => {
                    log::warn!("{} could not be found", id);
                    return false;
                }
            },
            None => None,
        };
        let switched = self.switch_to_key(target, initiator, subview);
        if !switched {
            log::info!("switching to plugin: {} failed", plugin_id);
        }
        switched
    }

    pub(crate) fn switch_to_key(&mut self, target: PluginKey, initiator: Option<PluginKey>, subview: Option<&str>) -> bool {
        let initiator = initiator.or_else(|| self.active_on_screen_owner());
        if initiator == Some(target) {
            return true;
        }
        if initiator.is_none() {
            log::warn!("Switching without initiator");
        }
        self.try_switch(SwitchDirection::Undefined, initiator, target, subview)
    }

    fn active_on_screen_owner(&self) -> Option<PluginKey> {
        self.handlers
            .get(HandlerState::OnScreen)
            .filter(|key| self.active.contains(key))
    }

    /// Moves the states of `source` to `candidate`, or changes nothing
    ///
    /// Without a source the candidate inherits OnScreen.
    pub(crate) fn try_switch(
        &mut self,
        direction: SwitchDirection,
        source: Option<PluginKey>,
        candidate: PluginKey,
        subview: Option<&str>,
    ) -> bool {
        let (candidate_id, supported) = match self.registry.get(candidate) {
            Some(plugin) => (plugin.id.clone(), plugin.plugin.supported_states()),
            None => return false,
        };

        if self.active.contains(&candidate) {
            log::warn!("{} is already active", candidate_id);
            return false;
        }

        let inherited = match source {
            Some(source) => self
                .registry
                .get(source)
                .map(|plugin| plugin.state.clone())
                .unwrap_or_default(),
            None => plugin_state(&[HandlerState::OnScreen]),
        };
        if inherited.is_empty() {
            log::warn!("Switch source of {} serves no state", candidate_id);
            return false;
        }

        if !supported.is_superset(&inherited) {
            log::warn!("{} does not contain state {:?}", candidate_id, inherited);
            return false;
        }

        if inherited.contains(&HandlerState::OnScreen) && !self.onscreen.is_enabled(&candidate_id) {
            log::warn!("{} not enabled", candidate_id);
            return false;
        }

        self.change_handler_map(source, candidate, &supported);
        self.replace_plugin(direction, source, candidate, inherited, subview);
        true
    }

    fn change_handler_map(&mut self, origin: Option<PluginKey>, replacement: PluginKey, states: &PluginState) {
        let origin = match origin {
            Some(origin) => origin,
            None => return,
        };
        let replacement_id = match self.registry.get(replacement) {
            Some(plugin) => plugin.id.clone(),
            None => return,
        };

        for state in states.iter().copied() {
            if state == HandlerState::OnScreen {
                continue;
            }
            if self.handlers.get(state) == Some(origin) {
                // map first so the setting change finds it synchronized
                self.handlers.set(state, replacement);
                self.persist_handler(state, &replacement_id);
            }
        }
    }

    fn replace_plugin(
        &mut self,
        direction: SwitchDirection,
        source: Option<PluginKey>,
        replacement: PluginKey,
        state: PluginState,
        subview: Option<&str>,
    ) {
        self.activate_plugin(replacement);

        let visible = self.visible;
        let overrides = self.key_overrides.clone();
        let (replacement_id, active_subview) = match self.registry.get_mut(replacement) {
            Some(plugin) => {
                let input_method = plugin.input_method.as_mut();
                plugin.state = state.clone();
                input_method.set_state(&state);

                match subview {
                    Some(id) if state.contains(&HandlerState::OnScreen) => {
                        input_method.set_active_subview(id, HandlerState::OnScreen);
                    }
                    _ if plugin.last_switch_direction == direction
                        || (plugin.last_switch_direction == SwitchDirection::Undefined
                            && direction == SwitchDirection::Backward) =>
                    {
                        input_method.switch_context(direction, false);
                    }
                    _ => {}
                }

                input_method.set_key_overrides(&overrides);
                if visible {
                    input_method.show();
                    input_method.show_language_notification();
                }
                (
                    plugin.id.clone(),
                    input_method.active_subview(HandlerState::OnScreen),
                )
            }
            None => return,
        };

        if let Some(source) = source {
            if let Some(plugin) = self.registry.get_mut(source) {
                plugin.last_switch_direction = direction;
            }
            // only after the replacement is visible
            self.deactivate_plugin(source);
        }

        if state.contains(&HandlerState::OnScreen) {
            self.handlers.set(HandlerState::OnScreen, replacement);
            self.active_subview_on_screen = active_subview.clone();
            if let Some(id) = active_subview {
                self.onscreen
                    .set_active_subview(SubView::new(replacement_id, id), self.settings.as_mut());
            }
        }
    }

    /// Selects a subview of the active OnScreen plugin
    pub fn set_active_subview(&mut self, subview_id: &str, state: HandlerState) -> bool {
        if state != HandlerState::OnScreen {
            log::warn!("Unsupported state: {} for active subview", state);
            return false;
        }
        if subview_id.is_empty() {
            return false;
        }

        let key = match self.handlers.get(HandlerState::OnScreen) {
            Some(key) if self.active.contains(&key) => key,
            _ => {
                log::warn!("No active plugin");
                return false;
            }
        };
        let plugin_id = match self.registry.get(key) {
            Some(plugin) => plugin.id.clone(),
            None => return false,
        };

        let persisted = self.onscreen.active_subview().cloned();
        if persisted.as_ref().map(|s| s.plugin.as_str()) != Some(plugin_id.as_str()) {
            log::warn!("{} is not the active subview plugin", plugin_id);
            return false;
        }

        let subview = SubView::new(plugin_id, subview_id);
        if !self.onscreen.is_subview_enabled(&subview) {
            log::warn!("{} is not enabled", subview);
            return false;
        }

        let plugin = match self.registry.get_mut(key) {
            Some(plugin) => plugin,
            None => return false,
        };
        let offered = plugin
            .input_method
            .subviews(HandlerState::OnScreen)
            .iter()
            .any(|s| s.id == subview_id);
        if !offered {
            return false;
        }

        self.active_subview_on_screen = Some(subview_id.to_string());
        if plugin.input_method.active_subview(HandlerState::OnScreen).as_deref() != Some(subview_id) {
            plugin
                .input_method
                .set_active_subview(subview_id, HandlerState::OnScreen);
        }
        if persisted.map(|s| s.id) != Some(subview.id.clone()) {
            self.onscreen
                .set_active_subview(subview, self.settings.as_mut());
        }
        true
    }

    /// Follows the persisted active on-screen subview
    pub(crate) fn on_screen_subview_changed(&mut self) {
        let subview = match self.onscreen.active_subview() {
            Some(subview) => subview.clone(),
            None => return,
        };

        let current = self.handlers.get(HandlerState::OnScreen);
        let initiator = current.filter(|key| self.active.contains(key));
        let current_matches = initiator
            .and_then(|key| self.registry.get(key))
            .map_or(false, |plugin| plugin.id == subview.plugin);
        if current_matches {
            log::info!("Switching subview to {}", subview);
            self.set_active_subview(&subview.id, HandlerState::OnScreen);
            return;
        }

        let replacement = match self.registry.find(&subview.plugin) {
            Some(key) => key,
            None => {
                log::warn!("Could not find plugin: {}", subview.plugin);
                return;
            }
        };

        // OnScreen input is not in use right now, only remember the owner
        if initiator.is_none()
            && !self.requested_handlers.is_empty()
            && !self.requested_handlers.contains(&HandlerState::OnScreen)
        {
            self.handlers.set(HandlerState::OnScreen, replacement);
            return;
        }

        if !self.switch_to_key(replacement, initiator, Some(&subview.id)) {
            log::info!("switching to plugin: {} failed", subview.plugin);
            self.restore_active_subview(initiator);
        }
    }

    /// Points the persisted active subview back at the running plugin
    fn restore_active_subview(&mut self, initiator: Option<PluginKey>) {
        let running = initiator.and_then(|key| self.registry.get(key)).and_then(|plugin| {
            plugin
                .input_method
                .active_subview(HandlerState::OnScreen)
                .map(|id| SubView::new(plugin.id.clone(), id))
        });
        if let Some(running) = running {
            self.onscreen
                .set_active_subview(running, self.settings.as_mut());
        }
    }

    /// Routes `states` to their mapped plugins and deactivates the rest
    pub fn set_active_handlers(&mut self, states: &PluginState) {
        self.requested_handlers = states.clone();

        let keys: Vec<PluginKey> = self.registry.order().to_vec();
        for key in &keys {
            if let Some(plugin) = self.registry.get_mut(*key) {
                plugin.state.clear();
            }
        }

        let mut activated: Vec<PluginKey> = Vec::new();
        for state in states.iter().copied() {
            let key = match self.handlers.get(state) {
                Some(key) => key,
                None => continue,
            };
            self.activate_plugin(key);

            let visible = self.visible;
            if let Some(plugin) = self.registry.get_mut(key) {
                plugin.state.insert(state);
                if !activated.contains(&key) {
                    activated.push(key);
                }
                if visible {
                    plugin.input_method.show();
                    plugin.input_method.show_language_notification();
                }
            }
        }

        for key in &activated {
            if let Some(plugin) = self.registry.get_mut(*key) {
                let state = plugin.state.clone();
                plugin.input_method.set_state(&state);
            }
        }

        let previous = self.active.clone();
        for key in previous {
            if !activated.contains(&key) {
                self.deactivate_plugin(key);
            }
        }
    }

    /// Handler states of the active plugins
    pub fn active_handlers(&self) -> PluginState {
        self.active
            .iter()
            .filter_map(|key| self.registry.get(*key))
            .flat_map(|plugin| plugin.state.iter().copied())
            .collect()
    }

    /// Picks the handler states from the hardware keyboard and accessory
    /// status; OnScreen excludes both others
    pub fn update_input_source(&mut self) {
        let mut handlers = self.active_handlers();

        if self.hardware_keyboard_open {
            handlers.remove(&HandlerState::OnScreen);
            handlers.insert(HandlerState::Hardware);
        } else {
            handlers.remove(&HandlerState::Hardware);
            handlers.insert(HandlerState::OnScreen);
        }

        if self.settings.bool_value(keys::ACCESSORY_ENABLED, false) {
            handlers.remove(&HandlerState::OnScreen);
            handlers.insert(HandlerState::Accessory);
        } else {
            handlers.remove(&HandlerState::Accessory);
        }

        if !handlers.is_empty() {
            self.set_active_handlers(&handlers);
        }
    }

    pub fn show_active_plugins(&mut self) {
        self.visible = true;
        self.for_each_target(|target| target.show());
    }

    /// Hides the active plugins and turns accessory input off
    pub fn hide_active_plugins(&mut self) {
        self.visible = false;
        self.for_each_target(|target| target.hide());

        if self.settings.bool_value(keys::ACCESSORY_ENABLED, false) {
            if let Err(e) = self.settings.set(keys::ACCESSORY_ENABLED, Value::Bool(false)) {
                log::warn!("Could not disable accessory input: {}", e);
            }
        }
    }
}
