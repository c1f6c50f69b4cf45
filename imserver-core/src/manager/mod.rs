//! Plugin coordination
//!
//! [`PluginManager`] owns every loaded plugin and decides which of them
//! are active for which [`HandlerState`]. Its behavior is spread over
//! several files, each adding an `impl PluginManager` block:
//!
//! - `registry`: loading and unloading plugin files
//! - `handler_map`: the persisted handler state to plugin assignment
//! - `activation`: activation, switching and subview selection
//! - `queries`: read-only views for clients and settings UIs

mod activation;
mod handler_map;
mod onscreen;
mod queries;
mod registry;
mod settings_info;

pub use handler_map::HandlerMap;
pub use onscreen::OnScreenPlugins;
pub use registry::{LoadReport, PluginKey, PluginRegistry};
pub use settings_info::{
    entry_attributes, global_settings, PluginSettingsEntry, PluginSettingsInfo, SettingEntryType,
    SettingsRegistry, PLUGIN_SETTINGS_EXTENSION_ID, PLUGIN_SETTINGS_LIST_EXTENSION_ID,
};

use crate::config::ServerConfig;
use crate::connection::{ConnectionEvent, InputContextConnection};
use crate::lifecycle::{Clock, LifecycleCoordinator, SystemClock, RESPAWN_SHUTDOWN_DELAY};
use crate::plugin::{HostRequest, InputMethod, InputMethodHost, InputMethodPlugin, PluginLoader};
use crate::settings::{keys, SettingsBackend};
use crate::types::{HandlerState, KeyOverrides, PluginState, SwitchDirection};
use crate::widget::{dispatch, WidgetState, WidgetStateTracker, WidgetTargets};
use crate::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

const MAX_DRAIN_ROUNDS: usize = 16;

/// Global attribute target item that controls the subview override
const INPUT_METHOD_ITEM: &str = "inputMethod";
const LOAD_ALL_ATTRIBUTE: &str = "loadAll";

/// A loaded plugin and its input method instance
pub struct PluginDescriptor {
    /// File name of the plugin, stable across reloads
    pub id: String,
    pub path: PathBuf,
    pub plugin: Box<dyn InputMethodPlugin>,
    pub input_method: Box<dyn InputMethod>,
    pub host: InputMethodHost,
    /// Handler states currently routed to this plugin
    pub state: PluginState,
    pub last_switch_direction: SwitchDirection,
}

/// Notifications for the embedding event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    PluginLoaded(String),
    PluginUnloaded(String),
    PluginsChanged,
}

/// Everything the manager needs from its environment
pub struct ManagerContext {
    pub config: ServerConfig,
    pub settings: Box<dyn SettingsBackend>,
    pub loader: Box<dyn PluginLoader>,
    pub connection: Box<dyn InputContextConnection>,
    pub clock: Rc<dyn Clock>,
}

impl ManagerContext {
    pub fn new(
        settings: Box<dyn SettingsBackend>,
        loader: Box<dyn PluginLoader>,
        connection: Box<dyn InputContextConnection>,
    ) -> Self {
        Self {
            config: ServerConfig::default(),
            settings,
            loader,
            connection,
            clock: Rc::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub struct PluginManager {
    config: ServerConfig,
    settings: Box<dyn SettingsBackend>,
    loader: Box<dyn PluginLoader>,
    connection: Box<dyn InputContextConnection>,
    registry: PluginRegistry,
    handlers: HandlerMap,
    /// Active plugins in activation order, also the notification targets
    active: Vec<PluginKey>,
    /// Handler states last requested by input source selection
    requested_handlers: PluginState,
    onscreen: OnScreenPlugins,
    active_subview_on_screen: Option<String>,
    settings_registry: SettingsRegistry,
    widget: WidgetStateTracker,
    lifecycle: LifecycleCoordinator,
    plugin_dirs: Vec<PathBuf>,
    visible: bool,
    hardware_keyboard_open: bool,
    last_orientation: i32,
    toolbar_id: Option<i32>,
    key_overrides: KeyOverrides,
    events: Vec<ManagerEvent>,
}

/// Active input methods in activation order
struct ActiveTargets<'a> {
    registry: &'a mut PluginRegistry,
    active: &'a [PluginKey],
}

impl WidgetTargets for ActiveTargets<'_> {
    fn for_each_target(&mut self, f: &mut dyn FnMut(&mut dyn InputMethod)) {
        for key in self.active {
            if let Some(plugin) = self.registry.get_mut(*key) {
                f(plugin.input_method.as_mut());
            }
        }
    }
}

impl PluginManager {
    /// Creates the manager and loads the plugins
    ///
    /// Fails with [`crate::Error::NoPluginsLoaded`] when no plugin could be
    /// loaded, in which case the service must not keep running.
    pub fn new(context: ManagerContext) -> Result<Self> {
        let ManagerContext {
            config,
            mut settings,
            loader,
            connection,
            clock,
        } = context;

        // the server always starts with accessory input disabled
        settings.set(keys::ACCESSORY_ENABLED, Value::Bool(false))?;
        settings.take_changes();

        let onscreen = OnScreenPlugins::load(settings.as_ref());
        let mut lifecycle = LifecycleCoordinator::new(clock);
        if config.wants_initial_shutdown_timer() {
            lifecycle.start_initial_timer(RESPAWN_SHUTDOWN_DELAY);
        }

        let mut manager = Self {
            config,
            settings,
            loader,
            connection,
            registry: PluginRegistry::default(),
            handlers: HandlerMap::default(),
            active: Vec::new(),
            requested_handlers: PluginState::new(),
            onscreen,
            active_subview_on_screen: None,
            settings_registry: SettingsRegistry::default(),
            widget: WidgetStateTracker::new(),
            lifecycle,
            plugin_dirs: Vec::new(),
            visible: false,
            hardware_keyboard_open: false,
            last_orientation: 0,
            toolbar_id: None,
            key_overrides: KeyOverrides::new(),
            events: Vec::new(),
        };

        manager.update_plugins()?;
        manager.process_host_requests();
        manager.process_settings_changes()?;
        Ok(manager)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn settings(&self) -> &dyn SettingsBackend {
        self.settings.as_ref()
    }

    /// Direct settings access; changes take effect on the next
    /// [`PluginManager::process_settings_changes`]
    pub fn settings_mut(&mut self) -> &mut dyn SettingsBackend {
        self.settings.as_mut()
    }

    pub fn connection_mut(&mut self) -> &mut dyn InputContextConnection {
        self.connection.as_mut()
    }

    pub fn widget_state(&self) -> &WidgetState {
        self.widget.current()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_client_connected(&self) -> bool {
        self.lifecycle.is_client_connected()
    }

    pub fn take_events(&mut self) -> Vec<ManagerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_termination_hook(&mut self, hook: impl FnMut() + 'static) {
        self.lifecycle.set_termination_hook(hook);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.lifecycle.next_deadline()
    }

    /// Runs expired timers; true when the shutdown timer fired
    pub fn poll_timers(&mut self) -> bool {
        self.lifecycle.poll()
    }

    /// Handles one event and everything it caused
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Result<()> {
        match event {
            ConnectionEvent::WidgetStateChanged {
                client_id,
                state,
                focus_changed,
            } => self.handle_widget_state_changed(client_id, state, focus_changed),
            ConnectionEvent::ClientActivated { client_id } => {
                log::debug!("Client {} activated", client_id);
                self.handle_client_connection();
            }
            ConnectionEvent::ClientDisconnected { client_id } => {
                log::debug!("Client {} disconnected", client_id);
            }
            ConnectionEvent::ActiveClientDisconnected => self.handle_client_disconnection(),
            ConnectionEvent::KeyEvent { event } => {
                self.for_each_target(|target| target.process_key_event(&event));
            }
            ConnectionEvent::PreeditChanged { text, cursor_pos } => {
                self.for_each_target(|target| target.set_preedit(&text, cursor_pos));
            }
            ConnectionEvent::OrientationAboutToChange { angle } => {
                self.for_each_target(|target| target.handle_app_orientation_about_to_change(angle));
            }
            ConnectionEvent::OrientationChanged { angle } => {
                self.last_orientation = angle;
                self.for_each_target(|target| target.handle_app_orientation_changed(angle));
            }
            ConnectionEvent::ShowInputMethod => self.show_active_plugins(),
            ConnectionEvent::HideInputMethod => self.hide_active_plugins(),
            ConnectionEvent::ResetInputMethod => {
                self.for_each_target(|target| target.reset());
            }
            ConnectionEvent::MouseClickedOnPreedit { pos, preedit_rect } => {
                self.for_each_target(|target| target.handle_mouse_click_on_preedit(pos, preedit_rect));
            }
            ConnectionEvent::PluginSettingsRequested {
                client_id,
                language,
            } => self.plugin_settings_requested(client_id, &language),
            ConnectionEvent::AppFocusChanged { win_id } => {
                log::debug!("Application window {} focused", win_id);
            }
            ConnectionEvent::ToolbarChanged { id, overrides } => self.set_toolbar(id, overrides),
            ConnectionEvent::KeyOverridesChanged { overrides } => self.update_key_overrides(overrides),
            ConnectionEvent::GlobalAttributeChanged {
                target_item,
                attribute,
                value,
                ..
            } => self.global_attribute_changed(&target_item, &attribute, &value),
            ConnectionEvent::HardwareKeyboardChanged { open } => self.set_hardware_keyboard_open(open),
        }

        self.process_host_requests();
        self.process_settings_changes()
    }

    pub fn handle_widget_state_changed(&mut self, client_id: u32, state: WidgetState, focus_changed: bool) {
        let change = self.widget.update(client_id, state, focus_changed);
        if dispatch(&change, &mut self.targets()) {
            self.hide_active_plugins();
        }
    }

    pub fn handle_client_connection(&mut self) {
        self.lifecycle.client_connected();
        self.for_each_target(|target| target.handle_client_change());
    }

    /// The active client went away: arm the shutdown timer and drop its
    /// widget state as a focus loss
    pub fn handle_client_disconnection(&mut self) {
        self.lifecycle.client_disconnected(self.settings.as_ref());
        self.for_each_target(|target| target.handle_client_change());

        let change = self.widget.clear();
        if dispatch(&change, &mut self.targets()) {
            self.hide_active_plugins();
        }

        if self.onscreen.set_all_subviews_enabled(false) {
            self.notify_plugins_changed();
        }
    }

    pub fn set_hardware_keyboard_open(&mut self, open: bool) {
        if self.hardware_keyboard_open == open {
            return;
        }
        self.hardware_keyboard_open = open;
        self.update_input_source();
    }

    /// Forwards toolbar key overrides unless there is nothing to override
    /// and no widget has focus
    pub fn set_toolbar(&mut self, id: i32, overrides: KeyOverrides) {
        self.toolbar_id = Some(id);
        self.key_overrides = overrides;

        let focus = match self.widget.current().focus_state() {
            Some(focus) => focus,
            None => {
                log::error!("focus state is invalid.");
                false
            }
        };
        if !focus && self.key_overrides.is_empty() {
            return;
        }

        self.forward_key_overrides();
    }

    pub fn update_key_overrides(&mut self, overrides: KeyOverrides) {
        self.key_overrides = overrides;
        self.forward_key_overrides();
    }

    pub fn set_all_subviews_enabled(&mut self, enable: bool) {
        if self.onscreen.set_all_subviews_enabled(enable) {
            self.notify_plugins_changed();
        }
    }

    fn global_attribute_changed(&mut self, target_item: &str, attribute: &str, value: &Value) {
        if target_item == INPUT_METHOD_ITEM && attribute == LOAD_ALL_ATTRIBUTE {
            self.set_all_subviews_enabled(value.as_bool().unwrap_or(false));
        }
    }

    pub fn plugin_settings_requested(&mut self, client_id: u32, language: &str) {
        let infos = self.settings_registry.snapshot(self.settings.as_ref(), language);
        if let Err(e) = self.connection.plugin_settings_loaded(client_id, &infos) {
            log::warn!("Could not send plugin settings to client {}: {}", client_id, e);
        }
    }

    /// Serves the requests plugins queued on their hosts
    pub fn process_host_requests(&mut self) {
        for _ in 0..MAX_DRAIN_ROUNDS {
            let pending: Vec<(PluginKey, HostRequest)> = self
                .registry
                .iter()
                .flat_map(|(key, plugin)| {
                    plugin
                        .host
                        .take_requests()
                        .into_iter()
                        .map(move |request| (key, request))
                })
                .collect();
            if pending.is_empty() {
                return;
            }
            for (key, request) in pending {
                self.handle_host_request(key, request);
            }
        }
        log::warn!("Plugin requests still pending after {} rounds", MAX_DRAIN_ROUNDS);
    }

    fn handle_host_request(&mut self, key: PluginKey, request: HostRequest) {
        let is_active = self.active.contains(&key);
        match request {
            HostRequest::SwitchPlugin(direction) if is_active => {
                self.switch_plugin_key(direction, key);
            }
            HostRequest::SwitchPluginTo { plugin_id, subview } if is_active => {
                match self.registry.find(&plugin_id) {
                    Some(target) => {
                        if !self.switch_to_key(target, Some(key), subview.as_deref()) {
                            log::info!("switching to plugin: {} failed", plugin_id);
                        }
                    }
                    None => log::warn!("{} could not be found", plugin_id),
                }
            }
            HostRequest::SetActiveSubView { id, state } if is_active => {
                self.set_active_subview(&id, state);
            }
            HostRequest::UpdateInputMethodArea(area) => {
                if let Err(e) = self.connection.update_input_method_area(area) {
                    log::warn!("Could not update input method area: {}", e);
                }
            }
            HostRequest::RegisterSetting(entry) => {
                if let Some(plugin) = self.registry.get(key) {
                    let mut info = PluginSettingsInfo::new(
                        plugin.id.clone(),
                        plugin.plugin.name(),
                        PLUGIN_SETTINGS_EXTENSION_ID,
                    );
                    info.entries.push(entry);
                    self.settings_registry.register(info);
                }
            }
            request => log::debug!("Dropping {:?} from an inactive plugin", request),
        }
    }

    /// Reacts to the settings changed since the last call
    ///
    /// Every changed key is handled even when an earlier one fails; the
    /// first failure is returned once the changes are drained.
    pub fn process_settings_changes(&mut self) -> Result<()> {
        let mut result = Ok(());
        for _ in 0..MAX_DRAIN_ROUNDS {
            let changes = self.settings.take_changes();
            if changes.is_empty() {
                return result;
            }
            for key in changes {
                if let Err(e) = self.setting_changed(&key) {
                    log::error!("Handling change of {} failed: {}", key, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
            self.process_host_requests();
        }
        log::warn!("Settings still changing after {} rounds", MAX_DRAIN_ROUNDS);
        result
    }

    fn setting_changed(&mut self, key: &str) -> Result<()> {
        match key {
            keys::ONSCREEN_ACTIVE => {
                if self.onscreen.reload(key, self.settings.as_ref()) {
                    self.on_screen_subview_changed();
                }
            }
            keys::ONSCREEN_ENABLED => {
                if self.onscreen.reload(key, self.settings.as_ref()) {
                    if self.onscreen.ensure_active_enabled(self.settings.as_mut()) {
                        self.on_screen_subview_changed();
                    }
                    self.notify_plugins_changed();
                }
            }
            keys::ACCESSORY_ENABLED => self.update_input_source(),
            keys::LOCALE_INFO => self.update_plugins()?,
            keys::STATIC_SERVICE | keys::SHUTDOWN_TIMEOUT => {
                self.lifecycle.policy_changed(self.settings.as_ref());
            }
            _ => {
                for state in [HandlerState::Hardware, HandlerState::Accessory] {
                    if state.setting_name().map(keys::handler).as_deref() == Some(key) {
                        self.reconcile(state);
                    }
                }
            }
        }
        Ok(())
    }

    fn targets(&mut self) -> ActiveTargets<'_> {
        ActiveTargets {
            registry: &mut self.registry,
            active: &self.active,
        }
    }

    fn for_each_target(&mut self, mut f: impl FnMut(&mut dyn InputMethod)) {
        self.targets().for_each_target(&mut f);
    }

    fn forward_key_overrides(&mut self) {
        let overrides = self.key_overrides.clone();
        self.for_each_target(|target| target.set_key_overrides(&overrides));
    }

    fn notify_plugins_changed(&mut self) {
        for (_, plugin) in self.registry.iter() {
            plugin.host.notify_plugins_changed();
        }
        self.events.push(ManagerEvent::PluginsChanged);
    }
}
