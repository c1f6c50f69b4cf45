use crate::settings::{keys, SettingsBackend};
use crate::types::SubView;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Extension id of plugin settings descriptions
pub const PLUGIN_SETTINGS_EXTENSION_ID: i32 = -3;
/// Extension id of the settings list listener entry
pub const PLUGIN_SETTINGS_LIST_EXTENSION_ID: i32 = -4;

/// Attribute names of a settings entry
pub mod entry_attributes {
    pub const VALUE_DOMAIN: &str = "valueDomain";
    pub const VALUE_DOMAIN_DESCRIPTIONS: &str = "valueDomainDescriptions";
    pub const VALUE_RANGE_MIN: &str = "valueRangeMin";
    pub const VALUE_RANGE_MAX: &str = "valueRangeMax";
    pub const DEFAULT_VALUE: &str = "defaultValue";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingEntryType {
    String,
    StringList,
    Int,
    IntList,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettingsEntry {
    pub description: String,
    pub extension_key: String,
    pub entry_type: SettingEntryType,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl PluginSettingsEntry {
    pub fn new(extension_key: impl Into<String>, description: impl Into<String>, entry_type: SettingEntryType) -> Self {
        Self {
            description: description.into(),
            extension_key: extension_key.into(),
            entry_type,
            value: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Settings of one plugin, or of the server itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettingsInfo {
    #[serde(default)]
    pub description_language: String,
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_description: String,
    pub extension_id: i32,
    #[serde(default)]
    pub entries: Vec<PluginSettingsEntry>,
}

impl PluginSettingsInfo {
    pub fn new(plugin_name: impl Into<String>, plugin_description: impl Into<String>, extension_id: i32) -> Self {
        Self {
            description_language: String::new(),
            plugin_name: plugin_name.into(),
            plugin_description: plugin_description.into(),
            extension_id,
            entries: Vec::new(),
        }
    }
}

/// Server entries for the active and enabled on-screen subviews
///
/// `subviews` pairs every offered subview with its human readable title.
pub fn global_settings(subviews: &[(SubView, String)]) -> PluginSettingsInfo {
    let domain: Vec<Value> = subviews
        .iter()
        .map(|(subview, _)| Value::String(subview.to_string()))
        .collect();
    let descriptions: Vec<Value> = subviews
        .iter()
        .map(|(_, title)| Value::String(title.clone()))
        .collect();

    let with_domain = |entry: PluginSettingsEntry| {
        entry
            .with_attribute(entry_attributes::VALUE_DOMAIN, Value::Array(domain.clone()))
            .with_attribute(
                entry_attributes::VALUE_DOMAIN_DESCRIPTIONS,
                Value::Array(descriptions.clone()),
            )
    };

    let mut global = PluginSettingsInfo::new("server", "Global", PLUGIN_SETTINGS_EXTENSION_ID);
    global.entries.push(with_domain(PluginSettingsEntry::new(
        keys::ONSCREEN_ACTIVE,
        "Active subview",
        SettingEntryType::String,
    )));
    global.entries.push(with_domain(PluginSettingsEntry::new(
        keys::ONSCREEN_ENABLED,
        "Enabled subviews",
        SettingEntryType::StringList,
    )));
    global
}

/// Registered settings descriptions, merged per plugin
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    infos: Vec<PluginSettingsInfo>,
}

impl SettingsRegistry {
    pub fn infos(&self) -> &[PluginSettingsInfo] {
        &self.infos
    }

    /// Starts over with the server entries, keeping plugins matching `keep`
    pub fn reset(&mut self, global: PluginSettingsInfo, keep: impl Fn(&str) -> bool) {
        let plugin_infos: Vec<PluginSettingsInfo> = self
            .infos
            .drain(..)
            .filter(|info| info.extension_id == PLUGIN_SETTINGS_EXTENSION_ID && info.plugin_name != global.plugin_name)
            .filter(|info| keep(&info.plugin_name))
            .collect();

        self.register(PluginSettingsInfo::new(
            "@settings",
            "",
            PLUGIN_SETTINGS_LIST_EXTENSION_ID,
        ));
        self.register(global);
        for info in plugin_infos {
            self.register(info);
        }
    }

    pub fn register(&mut self, info: PluginSettingsInfo) {
        match self.infos.iter_mut().find(|i| i.plugin_name == info.plugin_name) {
            Some(existing) => existing.entries.extend(info.entries),
            None => self.infos.push(info),
        }
    }

    /// Copy of all descriptions with current values filled in
    pub fn snapshot(&self, settings: &dyn SettingsBackend, language: &str) -> Vec<PluginSettingsInfo> {
        let mut infos = self.infos.clone();
        for info in &mut infos {
            info.description_language = language.to_string();
            for entry in &mut info.entries {
                entry.value = settings
                    .value(&entry.extension_key)
                    .or_else(|| entry.attributes.get(entry_attributes::DEFAULT_VALUE).cloned());
            }
        }
        infos
    }
}
