//! Input method plugins that record every call they receive

use imserver_core::plugin::{InputMethod, InputMethodHost, InputMethodPlugin};
use imserver_core::widget::UpdateEvent;
use imserver_core::{HandlerState, KeyEvent, KeyOverrides, PluginState, Point, Rect, SubViewInfo, SwitchDirection};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Calls of all spies, as `plugin:call` strings in call order
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Hosts handed to the spies, by plugin id
pub type HostRegistry = Rc<RefCell<BTreeMap<String, InputMethodHost>>>;

/// What a spy plugin file declares
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub name: String,
    pub states: PluginState,
    pub subviews: Vec<SubViewInfo>,
    pub fail_create: bool,
}

impl PluginSpec {
    pub fn new(name: &str, states: &[HandlerState]) -> Self {
        Self {
            name: name.to_string(),
            states: states.iter().copied().collect(),
            subviews: Vec::new(),
            fail_create: false,
        }
    }

    /// On-screen plugin offering `subviews`, titled after their ids
    pub fn onscreen(name: &str, subviews: &[&str]) -> Self {
        Self::new(name, &[HandlerState::OnScreen]).with_subviews(subviews)
    }

    pub fn with_subviews(mut self, subviews: &[&str]) -> Self {
        self.subviews = subviews
            .iter()
            .map(|id| SubViewInfo::new(*id, id.to_uppercase()))
            .collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_create = true;
        self
    }
}

pub struct SpyPlugin {
    pub id: String,
    pub spec: PluginSpec,
    pub log: CallLog,
    pub hosts: HostRegistry,
}

impl InputMethodPlugin for SpyPlugin {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn supported_states(&self) -> PluginState {
        self.spec.states.clone()
    }

    fn create_input_method(&self, host: InputMethodHost) -> Option<Box<dyn InputMethod>> {
        if self.spec.fail_create {
            return None;
        }
        self.hosts.borrow_mut().insert(self.id.clone(), host);
        Some(Box::new(SpyInputMethod {
            id: self.id.clone(),
            subviews: self.spec.subviews.clone(),
            active_subview: self.spec.subviews.first().map(|s| s.id.clone()),
            log: self.log.clone(),
        }))
    }
}

pub struct SpyInputMethod {
    id: String,
    subviews: Vec<SubViewInfo>,
    active_subview: Option<String>,
    log: CallLog,
}

impl SpyInputMethod {
    fn record(&self, call: impl AsRef<str>) {
        self.log.borrow_mut().push(format!("{}:{}", self.id, call.as_ref()));
    }
}

pub fn states_string(state: &PluginState) -> String {
    state.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",")
}

fn direction_name(direction: SwitchDirection) -> &'static str {
    match direction {
        SwitchDirection::Undefined => "undefined",
        SwitchDirection::Forward => "forward",
        SwitchDirection::Backward => "backward",
    }
}

impl InputMethod for SpyInputMethod {
    fn show(&mut self) {
        self.record("show");
    }

    fn hide(&mut self) {
        self.record("hide");
    }

    fn reset(&mut self) {
        self.record("reset");
    }

    fn set_state(&mut self, state: &PluginState) {
        self.record(format!("set_state:{}", states_string(state)));
    }

    fn show_language_notification(&mut self) {
        self.record("language_notification");
    }

    fn handle_app_orientation_about_to_change(&mut self, angle: i32) {
        self.record(format!("orientation_about_to_change:{}", angle));
    }

    fn handle_app_orientation_changed(&mut self, angle: i32) {
        self.record(format!("orientation:{}", angle));
    }

    fn handle_focus_change(&mut self, focus_in: bool) {
        self.record(format!("focus:{}", focus_in));
    }

    fn handle_visualization_priority_change(&mut self, priority: bool) {
        self.record(format!("visualization:{}", priority));
    }

    fn handle_client_change(&mut self) {
        self.record("client_change");
    }

    fn handle_mouse_click_on_preedit(&mut self, pos: Point, _preedit_rect: Rect) {
        self.record(format!("preedit_click:{},{}", pos.x, pos.y));
    }

    fn ext_event(&mut self, event: &UpdateEvent) -> bool {
        let mut keys = event.properties_changed().to_vec();
        keys.sort();
        self.record(format!("update_event:{}", keys.join(",")));
        false
    }

    fn update(&mut self) {
        self.record("update");
    }

    fn set_preedit(&mut self, text: &str, cursor: i32) {
        self.record(format!("preedit:{}:{}", text, cursor));
    }

    fn process_key_event(&mut self, event: &KeyEvent) {
        self.record(format!("key:{}", event.key));
    }

    fn switch_context(&mut self, direction: SwitchDirection, animated: bool) {
        self.record(format!("switch_context:{}:{}", direction_name(direction), animated));
    }

    fn subviews(&self, state: HandlerState) -> Vec<SubViewInfo> {
        if state == HandlerState::OnScreen {
            self.subviews.clone()
        } else {
            Vec::new()
        }
    }

    fn active_subview(&self, state: HandlerState) -> Option<String> {
        if state == HandlerState::OnScreen {
            self.active_subview.clone()
        } else {
            None
        }
    }

    fn set_active_subview(&mut self, id: &str, _state: HandlerState) {
        self.record(format!("set_active_subview:{}", id));
        self.active_subview = Some(id.to_string());
    }

    fn set_key_overrides(&mut self, overrides: &KeyOverrides) {
        self.record(format!("key_overrides:{}", overrides.len()));
    }
}
