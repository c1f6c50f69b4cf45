//! Shared fixture for the plugin manager integration tests
#![allow(dead_code)]

pub mod spy;

pub use spy::{states_string, CallLog, HostRegistry, PluginSpec, SpyPlugin};

use imserver_core::config::ServerConfig;
use imserver_core::connection::InputContextConnection;
use imserver_core::lifecycle::ManualClock;
use imserver_core::manager::PluginSettingsInfo;
use imserver_core::plugin::{InputMethodHost, InputMethodPlugin};
use imserver_core::{KeyEvent, ManagerContext, MemorySettings, PluginError, PluginManager, Rect};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Outbound commands as readable strings
pub type CommandLog = Rc<RefCell<Vec<String>>>;

pub struct RecordingConnection {
    pub commands: CommandLog,
}

impl InputContextConnection for RecordingConnection {
    fn update_input_method_area(&mut self, area: Rect) -> imserver_core::Result<()> {
        self.commands.borrow_mut().push(format!(
            "area:{},{},{},{}",
            area.x, area.y, area.width, area.height
        ));
        Ok(())
    }

    fn notify_extended_attribute_changed(
        &mut self,
        id: i32,
        _target: &str,
        _target_item: &str,
        attribute: &str,
        _value: &Value,
    ) -> imserver_core::Result<()> {
        self.commands
            .borrow_mut()
            .push(format!("attribute:{}:{}", id, attribute));
        Ok(())
    }

    fn plugin_settings_loaded(&mut self, client_id: u32, info: &[PluginSettingsInfo]) -> imserver_core::Result<()> {
        let names: Vec<&str> = info.iter().map(|i| i.plugin_name.as_str()).collect();
        self.commands
            .borrow_mut()
            .push(format!("settings:{}:{}", client_id, names.join(",")));
        Ok(())
    }

    fn send_commit_string(&mut self, text: &str, start: i32, length: i32, _cursor: i32) -> imserver_core::Result<()> {
        self.commands
            .borrow_mut()
            .push(format!("commit:{}:{}:{}", text, start, length));
        Ok(())
    }

    fn send_key_event(&mut self, event: &KeyEvent) -> imserver_core::Result<()> {
        self.commands.borrow_mut().push(format!("key:{}", event.key));
        Ok(())
    }
}

/// A plugin directory with spy plugin files and everything needed to
/// build a [`PluginManager`] on top of it
pub struct Fixture {
    pub dir: TempDir,
    pub specs: BTreeMap<String, PluginSpec>,
    pub log: CallLog,
    pub hosts: HostRegistry,
    pub commands: CommandLog,
    pub clock: ManualClock,
}

impl Fixture {
    pub fn new(plugins: &[(&str, PluginSpec)]) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut specs = BTreeMap::new();
        for (id, spec) in plugins {
            fs::write(dir.path().join(id), spec.name.as_bytes()).expect("write plugin file");
            specs.insert(id.to_string(), spec.clone());
        }

        Self {
            dir,
            specs,
            log: CallLog::default(),
            hosts: HostRegistry::default(),
            commands: CommandLog::default(),
            clock: ManualClock::new(),
        }
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Adds a plugin file after the fixture was created
    pub fn add_plugin(&mut self, id: &str, spec: PluginSpec) {
        fs::write(self.dir.path().join(id), spec.name.as_bytes()).expect("write plugin file");
        self.specs.insert(id.to_string(), spec);
    }

    /// Adds a plugin file in a subdirectory of the plugin directory
    pub fn add_plugin_in(&mut self, subdir: &str, id: &str, spec: PluginSpec) {
        let dir = self.dir.path().join(subdir);
        fs::create_dir_all(&dir).expect("create plugin subdir");
        fs::write(dir.join(id), spec.name.as_bytes()).expect("write plugin file");
        self.specs.insert(id.to_string(), spec);
    }

    pub fn remove_plugin_file(&self, id: &str) {
        fs::remove_file(self.dir.path().join(id)).expect("remove plugin file");
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            plugin_dir: self.plugin_dir(),
            locale_info_file: self.dir.path().join("no-locale-info"),
            ..ServerConfig::default()
        }
    }

    pub fn manager(&self, settings: MemorySettings) -> imserver_core::Result<PluginManager> {
        self.manager_with_config(settings, self.config())
    }

    pub fn manager_with_config(&self, settings: MemorySettings, config: ServerConfig) -> imserver_core::Result<PluginManager> {
        let specs = self.specs.clone();
        let log = self.log.clone();
        let hosts = self.hosts.clone();
        let loader = move |path: &Path| -> Result<Box<dyn InputMethodPlugin>, PluginError> {
            let id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            match specs.get(&id) {
                Some(spec) => Ok(Box::new(SpyPlugin {
                    id,
                    spec: spec.clone(),
                    log: log.clone(),
                    hosts: hosts.clone(),
                })),
                None => Err(PluginError::Load {
                    path: path.to_path_buf(),
                    message: "not a spy plugin".to_string(),
                }),
            }
        };

        let connection = RecordingConnection {
            commands: self.commands.clone(),
        };
        let context = ManagerContext::new(Box::new(settings), Box::new(loader), Box::new(connection))
            .with_config(config)
            .with_clock(Rc::new(self.clock.clone()));
        PluginManager::new(context)
    }

    pub fn host(&self, id: &str) -> InputMethodHost {
        self.hosts.borrow().get(id).cloned().expect("plugin has a host")
    }

    /// Drains the recorded plugin calls
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Drains the recorded calls of one plugin, without its prefix
    pub fn take_calls_of(&self, id: &str) -> Vec<String> {
        let prefix = format!("{}:", id);
        self.take_calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn take_commands(&self) -> Vec<String> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }
}

/// Spy calls whose name starts with one of `names`
pub fn only(calls: &[String], names: &[&str]) -> Vec<String> {
    calls
        .iter()
        .filter(|call| {
            let name = call.splitn(2, ':').nth(1).unwrap_or("");
            names.iter().any(|n| name.starts_with(n))
        })
        .cloned()
        .collect()
}
