//! Plugins described by TOML manifests
//!
//! Every `*.toml` file in a plugin directory describes one input method:
//! its name, the handler states it serves, its on-screen subviews and the
//! settings it exposes. Anything else in the directory is rejected and
//! ends up on the registry's blacklist.
//!
//! ```toml
//! name = "Latin"
//! states = ["onscreen", "hardware"]
//! switch-key = 0x01001120
//! area = { x = 0, y = 760, width = 1920, height = 320 }
//!
//! [[subviews]]
//! id = "en_US"
//! title = "English (US)"
//!
//! [[settings]]
//! key = "wordEngine"
//! description = "Word prediction"
//! type = "bool"
//! default = true
//! ```

use imserver_core::manager::{entry_attributes, SettingEntryType};
use imserver_core::plugin::{InputMethod, InputMethodHost, InputMethodPlugin, PluginLoader};
use imserver_core::{
    HandlerState, KeyEvent, KeyEventType, PluginError, PluginState, Rect, SubViewInfo, SwitchDirection,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub states: Vec<HandlerState>,
    /// Key code that asks the server for the next plugin
    #[serde(default)]
    pub switch_key: Option<u32>,
    /// Screen area claimed while shown on screen
    #[serde(default)]
    pub area: Option<Rect>,
    #[serde(default)]
    pub subviews: Vec<SubViewInfo>,
    #[serde(default)]
    pub settings: Vec<ManifestSetting>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestSetting {
    pub key: String,
    pub description: String,
    #[serde(rename = "type")]
    pub entry_type: SettingEntryType,
    #[serde(default)]
    pub default: Option<toml::Value>,
}

impl PluginManifest {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Loads manifest files
#[derive(Debug, Default)]
pub struct ManifestLoader;

impl ManifestLoader {
    pub fn new() -> Self {
        Self
    }
}

impl PluginLoader for ManifestLoader {
    fn load(&mut self, path: &Path) -> Result<Box<dyn InputMethodPlugin>, PluginError> {
        let load_error = |message: String| PluginError::Load {
            path: path.to_path_buf(),
            message,
        };

        if path.extension().and_then(|ext| ext.to_str()) != Some(MANIFEST_EXTENSION) {
            return Err(load_error("not a plugin manifest".to_string()));
        }

        let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let manifest = PluginManifest::parse(&text).map_err(|e| load_error(e.to_string()))?;
        log::debug!("Read manifest of {} from {}", manifest.name, path.display());

        Ok(Box::new(ManifestPlugin { manifest }))
    }
}

pub struct ManifestPlugin {
    manifest: PluginManifest,
}

impl ManifestPlugin {
    pub fn new(manifest: PluginManifest) -> Self {
        Self { manifest }
    }
}

impl InputMethodPlugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn supported_states(&self) -> PluginState {
        self.manifest.states.iter().copied().collect()
    }

    fn version(&self) -> Option<String> {
        self.manifest.version.clone()
    }

    fn create_input_method(&self, host: InputMethodHost) -> Option<Box<dyn InputMethod>> {
        for setting in &self.manifest.settings {
            let mut attributes = BTreeMap::new();
            if let Some(default) = &setting.default {
                match serde_json::to_value(default) {
                    Ok(value) => {
                        attributes.insert(entry_attributes::DEFAULT_VALUE.to_string(), value);
                    }
                    Err(e) => log::warn!("{}: invalid default for {}: {}", self.manifest.name, setting.key, e),
                }
            }
            host.register_setting(&setting.key, setting.description.clone(), setting.entry_type, attributes);
        }

        Some(Box::new(ManifestInputMethod::new(self.manifest.clone(), host)))
    }
}

/// Input method driven by its manifest
///
/// It owns no UI: showing it claims the manifest's screen area, its
/// subviews cycle in manifest order and the switch key hands over to the
/// next plugin.
pub struct ManifestInputMethod {
    manifest: PluginManifest,
    host: InputMethodHost,
    state: PluginState,
    active_subview: usize,
    shown: bool,
}

impl ManifestInputMethod {
    fn new(manifest: PluginManifest, host: InputMethodHost) -> Self {
        Self {
            manifest,
            host,
            state: PluginState::new(),
            active_subview: 0,
            shown: false,
        }
    }

    fn on_screen(&self) -> bool {
        self.state.contains(&HandlerState::OnScreen)
    }

    fn claim_area(&self) {
        let area = match self.manifest.area {
            Some(area) if self.shown && self.on_screen() => area,
            _ => Rect::default(),
        };
        self.host.update_input_method_area(area);
    }
}

impl InputMethod for ManifestInputMethod {
    fn show(&mut self) {
        self.shown = true;
        self.claim_area();
    }

    fn hide(&mut self) {
        if self.shown {
            self.shown = false;
            self.claim_area();
        }
    }

    fn set_state(&mut self, state: &PluginState) {
        self.state = state.clone();
        if self.shown {
            self.claim_area();
        }
    }

    fn show_language_notification(&mut self) {
        if let Some(subview) = self.manifest.subviews.get(self.active_subview) {
            log::info!("{}: {}", self.manifest.name, subview.title);
        }
    }

    fn process_key_event(&mut self, event: &KeyEvent) {
        if event.event_type == KeyEventType::Press && Some(event.key) == self.manifest.switch_key {
            self.host.switch_plugin(SwitchDirection::Forward);
        }
    }

    fn switch_context(&mut self, direction: SwitchDirection, _animated: bool) {
        let count = self.manifest.subviews.len();
        if count == 0 {
            return;
        }
        self.active_subview = match direction {
            SwitchDirection::Forward => (self.active_subview + 1) % count,
            SwitchDirection::Backward => (self.active_subview + count - 1) % count,
            SwitchDirection::Undefined => return,
        };
        let id = self.manifest.subviews[self.active_subview].id.clone();
        self.host.set_active_subview(id, HandlerState::OnScreen);
    }

    fn subviews(&self, state: HandlerState) -> Vec<SubViewInfo> {
        match state {
            HandlerState::OnScreen => self.manifest.subviews.clone(),
            _ => Vec::new(),
        }
    }

    fn active_subview(&self, state: HandlerState) -> Option<String> {
        match state {
            HandlerState::OnScreen => self
                .manifest
                .subviews
                .get(self.active_subview)
                .map(|subview| subview.id.clone()),
            _ => None,
        }
    }

    fn set_active_subview(&mut self, id: &str, state: HandlerState) {
        if state != HandlerState::OnScreen {
            return;
        }
        match self.manifest.subviews.iter().position(|subview| subview.id == id) {
            Some(index) => self.active_subview = index,
            None => log::warn!("{}: unknown subview {}", self.manifest.name, id),
        }
    }
}
