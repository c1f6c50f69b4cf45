use super::{entries_below, SettingsBackend};
use crate::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Settings kept in memory only; used for temporary settings and in tests
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, Value>,
    changes: Vec<String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds values without queuing change notifications
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            changes: Vec::new(),
        }
    }

    fn mark_changed(&mut self, key: &str) {
        if !self.changes.iter().any(|k| k == key) {
            self.changes.push(key.to_string());
        }
    }
}

impl SettingsBackend for MemorySettings {
    fn value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.mark_changed(key);
        }
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.mark_changed(key);
        }
        Ok(())
    }

    fn list_entries(&self, prefix: &str) -> Vec<String> {
        entries_below(self.values.keys(), prefix)
    }

    fn take_changes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changes_only_on_new_value() {
        let mut settings = MemorySettings::new();
        settings.set("a", json!(1)).unwrap();
        settings.set("a", json!(1)).unwrap();
        settings.set("b", json!(true)).unwrap();
        assert_eq!(settings.take_changes(), vec!["a".to_string(), "b".to_string()]);
        assert!(settings.take_changes().is_empty());

        settings.unset("a").unwrap();
        settings.unset("missing").unwrap();
        assert_eq!(settings.take_changes(), vec!["a".to_string()]);
    }

    #[test]
    fn test_seeded_values_are_not_changes() {
        let mut settings = MemorySettings::with_values([("static", json!(false))]);
        assert_eq!(settings.value("static"), Some(json!(false)));
        assert!(settings.take_changes().is_empty());
    }
}
