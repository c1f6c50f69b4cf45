use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one sub-mode of a plugin's on-screen UI
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SubView {
    pub plugin: String,
    pub id: String,
}

impl SubView {
    pub fn new(plugin: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            id: id.into(),
        }
    }

    /// Parses the persisted `plugin:subview` form
    pub fn parse(value: &str) -> Option<Self> {
        let (plugin, id) = value.split_once(':')?;
        if plugin.is_empty() {
            return None;
        }
        Some(Self::new(plugin, id))
    }
}

impl fmt::Display for SubView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin, self.id)
    }
}

/// Subview as offered by an input method instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubViewInfo {
    pub id: String,
    pub title: String,
}

impl SubViewInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Subview description handed out to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubViewDescription {
    pub plugin_id: String,
    pub id: String,
    pub title: String,
}

/// Plugin description handed out to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescription {
    pub name: String,
    pub enabled: bool,
}
