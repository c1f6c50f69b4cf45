use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SERVICE_NAME: &str = "com.webos.service.ime";
pub const DEFAULT_PLUGIN_DIR: &str = "/usr/lib/imserver/plugins";
pub const DEFAULT_LOCALE_INFO_FILE: &str = "/var/luna/preferences/localeInfo";

/// Server process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub instance_id: u32,
    /// Run without registering the well-known bus name
    pub no_bus_service: bool,
    pub plugin_dir: PathBuf,
    /// File backing the settings store; in-memory settings when unset
    pub settings_file: Option<PathBuf>,
    pub locale_info_file: PathBuf,
    /// Set when the process was restarted by its supervisor
    pub respawned: bool,
    /// Whether the supervisor runs the service permanently
    pub static_service: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_id: 0,
            no_bus_service: false,
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            settings_file: None,
            locale_info_file: PathBuf::from(DEFAULT_LOCALE_INFO_FILE),
            respawned: false,
            static_service: true,
        }
    }
}

impl ServerConfig {
    pub fn service_name(&self) -> String {
        if self.no_bus_service {
            format!("{}_{}", SERVICE_NAME, self.instance_id)
        } else {
            SERVICE_NAME.to_string()
        }
    }

    pub fn settings_app_id(&self) -> String {
        format!("{}.settings", self.service_name())
    }

    /// Respawned dynamic instances quit soon unless a client shows up
    pub fn wants_initial_shutdown_timer(&self) -> bool {
        self.respawned && !self.static_service
    }
}
