//! Application widget state as seen by the server
//!
//! The client sends the complete attribute map of the focused widget on
//! every change. [`WidgetState`] wraps that map with typed accessors and
//! [`WidgetStateTracker`] turns successive maps into plugin notifications.

mod tracker;
mod update_event;

pub use tracker::{dispatch, WidgetStateChange, WidgetStateTracker, WidgetTargets};
pub use update_event::UpdateEvent;

use crate::types::Rect;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Widget attribute names
pub mod attributes {
    pub const FOCUS_STATE: &str = "focusState";
    pub const CONTENT_TYPE: &str = "contentType";
    pub const ENTER_KEY_TYPE: &str = "enterKeyType";
    pub const CORRECTION_ENABLED: &str = "correctionEnabled";
    pub const PREDICTION_ENABLED: &str = "predictionEnabled";
    pub const AUTO_CAPITALIZATION_ENABLED: &str = "autocapitalizationEnabled";
    pub const SURROUNDING_TEXT: &str = "surroundingText";
    pub const CURSOR_POSITION: &str = "cursorPosition";
    pub const ANCHOR_POSITION: &str = "anchorPosition";
    pub const HAS_SELECTION: &str = "hasSelection";
    pub const HIDDEN_TEXT: &str = "hiddenText";
    pub const MAX_TEXT_LENGTH: &str = "maxTextLength";
    pub const PLATFORM_DATA: &str = "platformData";
    pub const INPUT_METHOD_HINTS: &str = "inputMethodHints";
    pub const INPUT_METHOD_MODE: &str = "inputMethodMode";
    pub const VISUALIZATION_PRIORITY: &str = "visualizationPriority";
    pub const WIN_ID: &str = "winId";
    pub const CURSOR_RECTANGLE: &str = "cursorRectangle";
    pub const PREEDIT_CLICK_POS: &str = "preeditClickPos";
    pub const TRANSLUCENT_INPUT_METHOD: &str = "translucentInputMethod";
    pub const WESTERN_NUMERIC_INPUT_ENFORCED: &str = "westernNumericInputEnforced";
}

/// Content type of the focused widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    FreeText,
    Number,
    PhoneNumber,
    Email,
    Url,
    Custom,
}

impl ContentType {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(ContentType::FreeText),
            1 => Some(ContentType::Number),
            2 => Some(ContentType::PhoneNumber),
            3 => Some(ContentType::Email),
            4 => Some(ContentType::Url),
            5 => Some(ContentType::Custom),
            _ => None,
        }
    }

    /// Name used by the remote keyboard service
    pub fn name(self) -> &'static str {
        match self {
            ContentType::Number => "number",
            ContentType::PhoneNumber => "phonenumber",
            ContentType::Email => "email",
            ContentType::Url => "url",
            ContentType::FreeText | ContentType::Custom => "text",
        }
    }
}

/// Attribute map of the focused widget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetState(BTreeMap<String, Value>);

impl WidgetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn bool_attr(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    fn int_attr(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn focus_state(&self) -> Option<bool> {
        self.bool_attr(attributes::FOCUS_STATE)
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.int_attr(attributes::CONTENT_TYPE)
            .and_then(ContentType::from_value)
    }

    pub fn enter_key_type(&self) -> Option<i64> {
        self.int_attr(attributes::ENTER_KEY_TYPE)
    }

    pub fn correction_enabled(&self) -> Option<bool> {
        self.bool_attr(attributes::CORRECTION_ENABLED)
    }

    pub fn prediction_enabled(&self) -> Option<bool> {
        self.bool_attr(attributes::PREDICTION_ENABLED)
    }

    pub fn auto_capitalization_enabled(&self) -> Option<bool> {
        self.bool_attr(attributes::AUTO_CAPITALIZATION_ENABLED)
    }

    pub fn hidden_text(&self) -> Option<bool> {
        self.bool_attr(attributes::HIDDEN_TEXT)
    }

    pub fn max_text_length(&self) -> Option<i64> {
        self.int_attr(attributes::MAX_TEXT_LENGTH)
    }

    pub fn platform_data(&self) -> Option<&Value> {
        self.0.get(attributes::PLATFORM_DATA)
    }

    /// Surrounding text and the cursor position inside it
    pub fn surrounding_text(&self) -> Option<(&str, i64)> {
        let text = self.0.get(attributes::SURROUNDING_TEXT)?.as_str()?;
        let cursor = self.int_attr(attributes::CURSOR_POSITION)?;
        Some((text, cursor))
    }

    pub fn has_selection(&self) -> Option<bool> {
        self.bool_attr(attributes::HAS_SELECTION)
    }

    pub fn anchor_position(&self) -> Option<i64> {
        self.int_attr(attributes::ANCHOR_POSITION)
    }

    pub fn input_method_mode(&self) -> Option<i64> {
        self.int_attr(attributes::INPUT_METHOD_MODE)
    }

    pub fn input_method_hints(&self) -> Option<i64> {
        self.int_attr(attributes::INPUT_METHOD_HINTS)
    }

    pub fn visualization_priority(&self) -> Option<bool> {
        self.bool_attr(attributes::VISUALIZATION_PRIORITY)
    }

    pub fn win_id(&self) -> Option<u64> {
        self.0.get(attributes::WIN_ID).and_then(Value::as_u64)
    }

    pub fn cursor_rectangle(&self) -> Option<Rect> {
        let value = self.0.get(attributes::CURSOR_RECTANGLE)?;
        serde_json::from_value(value.clone()).ok()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for WidgetState {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }
}
