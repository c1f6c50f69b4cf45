use super::{attributes, WidgetState};
use serde_json::Value;

/// Input method hint flag for number-first layouts
pub const HINT_PREFER_NUMBERS: i64 = 0x8;

/// Widget update handed to input methods through `ext_event`
///
/// Every accessor returns the current value together with whether it
/// changed in this update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    state: WidgetState,
    changed: Vec<String>,
    last_hints: i64,
}

impl UpdateEvent {
    pub fn new(state: WidgetState, changed: Vec<String>, last_hints: i64) -> Self {
        Self {
            state,
            changed,
            last_hints,
        }
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn properties_changed(&self) -> &[String] {
        &self.changed
    }

    pub fn is_changed(&self, key: &str) -> bool {
        self.changed.iter().any(|k| k == key)
    }

    /// Input method hints, zero when absent or out of the 32 bit range
    pub fn hints(&self) -> (i64, bool) {
        let changed = self.is_changed(attributes::INPUT_METHOD_HINTS);
        match self.state.input_method_hints() {
            Some(hints) if i32::try_from(hints).is_ok() => (hints, changed),
            Some(hints) => {
                log::warn!("Input method hints out of range: {}", hints);
                (0, changed)
            }
            None => (0, changed),
        }
    }

    pub fn is_flag_set(&self, flag: i64) -> (bool, bool) {
        let set = self
            .state
            .input_method_hints()
            .map(|hints| hints & flag != 0)
            .unwrap_or(false);
        (set, set != (self.last_hints & flag != 0))
    }

    pub fn prefer_numbers(&self) -> (bool, bool) {
        self.is_flag_set(HINT_PREFER_NUMBERS)
    }

    pub fn western_numeric_input_enforced(&self) -> (bool, bool) {
        self.bool_property(attributes::WESTERN_NUMERIC_INPUT_ENFORCED)
    }

    pub fn translucent_input_method(&self) -> (bool, bool) {
        self.bool_property(attributes::TRANSLUCENT_INPUT_METHOD)
    }

    fn bool_property(&self, key: &str) -> (bool, bool) {
        let value = self.state.get(key).and_then(Value::as_bool).unwrap_or(false);
        (value, self.is_changed(key))
    }
}
