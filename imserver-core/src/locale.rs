//! Locale dependent plugin directories

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const JAPANESE_PLUGIN_SUBDIR: &str = "JPN";
pub const CHINESE_PLUGIN_SUBDIR: &str = "CHN";

/// Reads the locale info object from the cache file (`{"localeInfo": {..}}`)
pub fn read_locale_cache(path: &Path) -> Option<Value> {
    let contents = fs::read_to_string(path).ok()?;
    let mut json: Value = match serde_json::from_str(&contents) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Invalid locale info in {}: {}", path.display(), e);
            return None;
        }
    };
    let info = json.get_mut("localeInfo")?.take();
    log::info!("Read localeInfo from file {}", path.display());
    Some(info)
}

/// Extra plugin directories below `base` for the configured keyboards
///
/// Without locale info every language specific directory is used.
pub fn extra_plugin_dirs(locale_info: Option<&Value>, base: &Path) -> Vec<PathBuf> {
    let japanese = base.join(JAPANESE_PLUGIN_SUBDIR);
    let chinese = base.join(CHINESE_PLUGIN_SUBDIR);

    let info = match locale_info {
        Some(info) if info.as_object().map_or(false, |o| !o.is_empty()) => info,
        _ => {
            log::warn!("localeInfo is unavailable, try to load all known plugins");
            return vec![japanese, chinese];
        }
    };

    let keyboards = info
        .get("keyboards")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    log::debug!("keyboards in localeInfo: {:?}", keyboards);

    let mut dirs = Vec::new();
    for lang in keyboards.iter().filter_map(Value::as_str) {
        let dir = match lang {
            "ja" => &japanese,
            "zh" | "zh-Hans" | "zh-Hant" => &chinese,
            _ => continue,
        };
        if !dirs.contains(dir) {
            log::info!("Loading plugins for keyboard language {}", lang);
            dirs.push(dir.clone());
        }
    }
    dirs
}
