//! Key/value settings store consumed by the server core
//!
//! Values are JSON values. Every backend queues the keys whose value
//! changed; the event loop drains them with [`SettingsBackend::take_changes`]
//! and hands them to the plugin manager, which keeps writes made by the
//! core itself from turning into feedback switches.

mod file;
mod memory;

pub use file::FileSettings;
pub use memory::MemorySettings;

use crate::Result;
use serde_json::Value;

/// Setting keys used by the server
pub mod keys {
    pub const CONFIG_ROOT: &str = "imserver/";
    pub const PLUGIN_PATHS: &str = "imserver/paths";
    pub const DISABLED_PLUGIN_FILES: &str = "imserver/disabledpluginfiles";
    pub const PLUGIN_ROOT: &str = "imserver/plugins";
    pub const PLUGIN_SETTINGS: &str = "imserver/pluginsettings";
    pub const ACCESSORY_ENABLED: &str = "imserver/accessoryenabled";
    pub const ONSCREEN_ENABLED: &str = "imserver/onscreen/enabled";
    pub const ONSCREEN_ACTIVE: &str = "imserver/onscreen/active";
    pub const SHUTDOWN_TIMEOUT: &str = "timeout";
    pub const STATIC_SERVICE: &str = "static";
    pub const LOCALE_INFO: &str = "localeInfo";

    /// Key holding the plugin assigned to a handler state
    pub fn handler(name: &str) -> String {
        format!("{}/{}", PLUGIN_ROOT, name)
    }

    /// Key of a plugin-registered setting
    pub fn plugin_setting(plugin_id: &str, key: &str) -> String {
        format!("{}/{}/{}", PLUGIN_SETTINGS, plugin_id, key)
    }
}

pub trait SettingsBackend {
    fn value(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
    fn unset(&mut self, key: &str) -> Result<()>;

    /// Keys stored directly below `prefix`
    fn list_entries(&self, prefix: &str) -> Vec<String>;

    /// Drains the keys changed since the last call, in change order
    fn take_changes(&mut self) -> Vec<String>;

    fn bool_value(&self, key: &str, default: bool) -> bool {
        match self.value(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
            Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(default),
            _ => default,
        }
    }

    /// Integer value; `None` when present but not convertible
    fn int_value(&self, key: &str, default: i64) -> Option<i64> {
        match self.value(key) {
            None | Some(Value::Null) => Some(default),
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        }
    }

    fn string_value(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn string_list(&self, key: &str) -> Option<Vec<String>> {
        match self.value(key)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::String(s) => Some(vec![s]),
            _ => None,
        }
    }
}

/// Direct children of `prefix` among `keys`
pub(crate) fn entries_below<'a>(keys: impl Iterator<Item = &'a String>, prefix: &str) -> Vec<String> {
    let dir = format!("{}/", prefix.trim_end_matches('/'));
    keys.filter(|key| {
        key.strip_prefix(&dir)
            .map(|rest| !rest.is_empty() && !rest.contains('/'))
            .unwrap_or(false)
    })
    .cloned()
    .collect()
}
