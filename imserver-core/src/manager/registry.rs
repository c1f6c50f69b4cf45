use super::{ManagerEvent, PluginDescriptor, PluginManager};
use crate::error::PluginError;
use crate::locale;
use crate::plugin::InputMethodHost;
use crate::settings::keys;
use crate::types::{HandlerState, SwitchDirection};
use crate::{Error, Result};
use slotmap::{new_key_type, SlotMap};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

new_key_type! {
    /// Handle of a loaded plugin
    pub struct PluginKey;
}

/// Loaded plugins in load order, plus the files known not to be plugins
#[derive(Default)]
pub struct PluginRegistry {
    plugins: SlotMap<PluginKey, PluginDescriptor>,
    order: Vec<PluginKey>,
    blacklist: BTreeSet<PathBuf>,
}

impl PluginRegistry {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in ring order
    pub fn order(&self) -> &[PluginKey] {
        &self.order
    }

    pub fn get(&self, key: PluginKey) -> Option<&PluginDescriptor> {
        self.plugins.get(key)
    }

    pub fn get_mut(&mut self, key: PluginKey) -> Option<&mut PluginDescriptor> {
        self.plugins.get_mut(key)
    }

    pub fn find(&self, plugin_id: &str) -> Option<PluginKey> {
        self.iter()
            .find(|(_, plugin)| plugin.id == plugin_id)
            .map(|(key, _)| key)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<PluginKey> {
        self.iter()
            .find(|(_, plugin)| plugin.path == path)
            .map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PluginKey, &PluginDescriptor)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.plugins.get(*key).map(|plugin| (*key, plugin)))
    }

    pub fn is_blacklisted(&self, path: &Path) -> bool {
        self.blacklist.contains(path)
    }

    fn blacklist(&mut self, path: &Path) {
        self.blacklist.insert(path.to_path_buf());
    }

    fn insert(&mut self, descriptor: PluginDescriptor) -> PluginKey {
        let key = self.plugins.insert(descriptor);
        self.order.push(key);
        key
    }

    fn remove(&mut self, key: PluginKey) -> Option<PluginDescriptor> {
        self.order.retain(|k| *k != key);
        self.plugins.remove(key)
    }
}

/// Outcome of one load pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// Plugins found in the scanned directories, newly loaded or not
    pub loaded: Vec<String>,
    pub failed: Vec<(PathBuf, String)>,
    pub unloaded: Vec<String>,
}

/// Regular files of `dir`, sorted by name
fn plugin_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl PluginManager {
    /// Recomputes the plugin directories and reloads when they changed
    pub fn update_plugins(&mut self) -> Result<()> {
        let base = self.config.plugin_dir.clone();
        let mut dirs: Vec<PathBuf> = match self.settings.string_list(keys::PLUGIN_PATHS) {
            Some(paths) => paths.into_iter().map(PathBuf::from).collect(),
            None => vec![base.clone()],
        };

        let locale_info = match self.settings.value(keys::LOCALE_INFO) {
            Some(info) if !info.is_null() => {
                log::info!("Read localeInfo from settings");
                Some(info)
            }
            _ => locale::read_locale_cache(&self.config.locale_info_file),
        };
        dirs.extend(locale::extra_plugin_dirs(locale_info.as_ref(), &base));
        dirs.sort();
        dirs.dedup();

        if dirs == self.plugin_dirs {
            log::info!("No plugin dirs change. No plugins updated");
            return Ok(());
        }

        log::info!("Updating plugins from {:?}", dirs);
        self.hide_active_plugins();
        self.load_all(&dirs)?;
        self.plugin_dirs = dirs;
        self.load_handler_map();
        self.register_settings();
        self.on_screen_subview_changed();
        self.update_input_source();
        Ok(())
    }

    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Loads every plugin file found in `dirs` and unloads the plugins
    /// that were not found
    pub fn load_all(&mut self, dirs: &[PathBuf]) -> Result<LoadReport> {
        let disabled = self
            .settings
            .string_list(keys::DISABLED_PLUGIN_FILES)
            .unwrap_or_default();
        let mut report = LoadReport::default();
        let mut effective = Vec::new();

        for dir in dirs {
            let files = match plugin_files(dir) {
                Ok(files) => files,
                Err(e) => {
                    log::debug!("Skipping plugin directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            for path in files {
                match self.load_plugin(&path, &disabled) {
                    Ok(key) if !effective.contains(&key) => effective.push(key),
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("{}", e);
                        report.failed.push((path, e.to_string()));
                    }
                }
            }
        }

        if effective.is_empty() {
            log::error!("No plugins were loaded. Stopping");
            return Err(Error::NoPluginsLoaded);
        }

        let available = self.available_plugins_and_subviews(HandlerState::OnScreen);
        self.onscreen
            .update_available_subviews(available, self.settings.as_mut());

        let stale: Vec<_> = self
            .registry
            .order()
            .iter()
            .filter(|key| !effective.contains(key))
            .copied()
            .collect();
        for key in stale {
            if let Some(id) = self.registry.get(key).map(|p| p.id.clone()) {
                if self.unload_key(key) {
                    report.unloaded.push(id);
                }
            }
        }

        report.loaded = effective
            .iter()
            .filter_map(|key| self.registry.get(*key))
            .map(|plugin| plugin.id.clone())
            .collect();
        self.notify_plugins_changed();
        Ok(report)
    }

    fn load_plugin(&mut self, path: &Path, disabled: &[String]) -> std::result::Result<PluginKey, PluginError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if disabled.contains(&file_name) {
            return Err(PluginError::Disabled(file_name));
        }

        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.registry.is_blacklisted(&path) {
            return Err(PluginError::Blacklisted(path));
        }

        if let Some(key) = self.registry.find_by_path(&path) {
            log::debug!("{} is already loaded", path.display());
            return Ok(key);
        }

        if self.registry.find(&file_name).is_some() {
            return Err(PluginError::Load {
                path,
                message: format!("a plugin named {} is already loaded", file_name),
            });
        }

        log::debug!("Loading file {}", path.display());
        let plugin = match self.loader.load(&path) {
            Ok(plugin) => plugin,
            Err(e) => {
                self.registry.blacklist(&path);
                return Err(e);
            }
        };

        if plugin.supported_states().is_empty() {
            self.registry.blacklist(&path);
            return Err(PluginError::NoSupportedStates(path));
        }

        let host = InputMethodHost::new(file_name.clone(), plugin.name());
        let input_method = match plugin.create_input_method(host.clone()) {
            Some(input_method) => input_method,
            None => {
                self.registry.blacklist(&path);
                return Err(PluginError::CreateFailed(path));
            }
        };

        match plugin.version() {
            Some(version) => log::info!("{} {} is loaded successfully", plugin.name(), version),
            None => log::info!("{} is loaded successfully", plugin.name()),
        }

        let key = self.registry.insert(PluginDescriptor {
            id: file_name.clone(),
            path,
            plugin,
            input_method,
            host,
            state: Default::default(),
            last_switch_direction: SwitchDirection::Undefined,
        });
        self.events.push(ManagerEvent::PluginLoaded(file_name));
        Ok(key)
    }

    /// Unloads a plugin; refused when it serves a handler state and no
    /// other plugin can take over
    pub fn unload(&mut self, plugin_id: &str) -> bool {
        let key = match self.registry.find(plugin_id) {
            Some(key) => key,
            None => {
                log::warn!("Ignore unload attempt of unknown plugin {}", plugin_id);
                return false;
            }
        };

        let unloaded = self.unload_key(key);
        if unloaded {
            self.notify_plugins_changed();
        }
        unloaded
    }

    fn unload_key(&mut self, key: PluginKey) -> bool {
        let (id, owns_state) = match self.registry.get(key) {
            Some(plugin) => (plugin.id.clone(), !plugin.state.is_empty()),
            None => return false,
        };

        if owns_state && !self.switch_direction(SwitchDirection::Forward, key) {
            log::warn!(
                "There seems no other plugin to activate in replacement of {}. Could not unload",
                id
            );
            return false;
        }

        self.deactivate_plugin(key);
        let orphaned = self.handlers.remove_plugin(key);
        self.registry.remove(key);

        // hand inactive handler states to the next plugin able to serve them
        for state in orphaned {
            if state == HandlerState::OnScreen {
                continue;
            }
            let next = self
                .registry
                .iter()
                .find(|(_, plugin)| plugin.plugin.supported_states().contains(&state))
                .map(|(key, plugin)| (key, plugin.id.clone()));
            match next {
                Some((next, next_id)) => {
                    self.handlers.set(state, next);
                    self.persist_handler(state, &next_id);
                }
                None => log::warn!("No plugin left for {} input", state),
            }
        }

        let available = self.available_plugins_and_subviews(HandlerState::OnScreen);
        if self
            .onscreen
            .update_available_subviews(available, self.settings.as_mut())
        {
            self.on_screen_subview_changed();
        }

        log::info!("Plugin unloaded {}", id);
        self.events.push(ManagerEvent::PluginUnloaded(id));
        true
    }
}
