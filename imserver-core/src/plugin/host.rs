use crate::manager::{PluginSettingsEntry, SettingEntryType};
use crate::settings::keys;
use crate::types::{HandlerState, Rect, SwitchDirection};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Requests an input method makes to the server
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    SwitchPlugin(SwitchDirection),
    SwitchPluginTo {
        plugin_id: String,
        subview: Option<String>,
    },
    SetActiveSubView {
        id: String,
        state: HandlerState,
    },
    UpdateInputMethodArea(Rect),
    RegisterSetting(PluginSettingsEntry),
}

#[derive(Debug, Default)]
struct HostInner {
    enabled: Cell<bool>,
    plugins_changed: Cell<u32>,
    requests: RefCell<Vec<HostRequest>>,
}

/// Per-plugin handle back into the server
///
/// Requests are queued and picked up by the plugin manager once the
/// current event has been dispatched. While the plugin is deactivated the
/// host is disabled and switch requests are dropped.
#[derive(Debug, Clone)]
pub struct InputMethodHost {
    plugin_id: String,
    plugin_name: String,
    inner: Rc<HostInner>,
}

impl InputMethodHost {
    pub fn new(plugin_id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_name: plugin_name.into(),
            inner: Rc::new(HostInner::default()),
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
    }

    pub fn switch_plugin(&self, direction: SwitchDirection) {
        self.push_if_enabled(HostRequest::SwitchPlugin(direction));
    }

    pub fn switch_plugin_to(&self, plugin_id: impl Into<String>, subview: Option<String>) {
        self.push_if_enabled(HostRequest::SwitchPluginTo {
            plugin_id: plugin_id.into(),
            subview,
        });
    }

    /// Reports that the plugin changed its active subview
    pub fn set_active_subview(&self, id: impl Into<String>, state: HandlerState) {
        self.push_if_enabled(HostRequest::SetActiveSubView { id: id.into(), state });
    }

    pub fn update_input_method_area(&self, area: Rect) {
        self.inner
            .requests
            .borrow_mut()
            .push(HostRequest::UpdateInputMethodArea(area));
    }

    /// Describes a plugin setting; returns the settings key holding its value
    pub fn register_setting(
        &self,
        key: &str,
        description: impl Into<String>,
        entry_type: SettingEntryType,
        attributes: BTreeMap<String, Value>,
    ) -> String {
        let full_key = keys::plugin_setting(&self.plugin_id, key);
        let mut entry = PluginSettingsEntry::new(full_key.clone(), description, entry_type);
        entry.attributes = attributes;
        self.inner
            .requests
            .borrow_mut()
            .push(HostRequest::RegisterSetting(entry));
        full_key
    }

    /// Number of "plugins changed" notifications received
    pub fn plugins_changed_count(&self) -> u32 {
        self.inner.plugins_changed.get()
    }

    pub(crate) fn notify_plugins_changed(&self) {
        self.inner.plugins_changed.set(self.inner.plugins_changed.get() + 1);
    }

    pub(crate) fn take_requests(&self) -> Vec<HostRequest> {
        std::mem::take(&mut *self.inner.requests.borrow_mut())
    }

    fn push_if_enabled(&self, request: HostRequest) {
        if !self.is_enabled() {
            log::debug!("{}: host disabled, dropping {:?}", self.plugin_id, request);
            return;
        }
        self.inner.requests.borrow_mut().push(request);
    }
}
