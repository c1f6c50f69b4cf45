use super::{entries_below, SettingsBackend};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings persisted as a flat TOML table of quoted keys
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    changes: Vec<String>,
}

impl FileSettings {
    /// Opens the settings file, starting empty when it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = Self::read_values(&path)?;
        Ok(Self {
            path,
            values,
            changes: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and queues a change for every key that differs
    pub fn reload(&mut self) -> Result<()> {
        let values = Self::read_values(&self.path)?;

        let mut changed: Vec<String> = values
            .iter()
            .filter(|(key, value)| self.values.get(*key) != Some(value))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(self.values.keys().filter(|key| !values.contains_key(*key)).cloned());

        self.values = values;
        for key in changed {
            self.mark_changed(&key);
        }
        Ok(())
    }

    fn read_values(path: &Path) -> Result<BTreeMap<String, Value>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Settings(format!("failed to parse {}: {}", path.display(), e)))
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(&self.values)
            .map_err(|e| Error::Settings(format!("failed to serialize settings: {}", e)))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn mark_changed(&mut self, key: &str) {
        if !self.changes.iter().any(|k| k == key) {
            self.changes.push(key.to_string());
        }
    }
}

impl SettingsBackend for FileSettings {
    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            return self.unset(key);
        }
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }

        self.values.insert(key.to_string(), value);
        self.mark_changed(key);
        self.save()
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_none() {
            return Ok(());
        }

        self.mark_changed(key);
        self.save()
    }

    fn list_entries(&self, prefix: &str) -> Vec<String> {
        entries_below(self.values.keys(), prefix)
    }

    fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changes)
    }
}
