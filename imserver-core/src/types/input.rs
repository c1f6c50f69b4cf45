use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventType {
    Press,
    Release,
}

/// Key event as received from, or sent to, the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub event_type: KeyEventType,
    pub key: u32,
    #[serde(default)]
    pub modifiers: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub auto_repeat: bool,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub native_scan_code: u32,
    #[serde(default)]
    pub native_modifiers: u32,
    #[serde(default)]
    pub time: u64,
}

fn default_count() -> u32 {
    1
}

impl KeyEvent {
    /// Qt-compatible key codes the server produces itself
    pub const KEY_BACKSPACE: u32 = 0x0100_0003;
    pub const KEY_RETURN: u32 = 0x0100_0004;

    pub fn new(event_type: KeyEventType, key: u32) -> Self {
        Self {
            event_type,
            key,
            modifiers: 0,
            text: String::new(),
            auto_repeat: false,
            count: 1,
            native_scan_code: 0,
            native_modifiers: 0,
            time: 0,
        }
    }

    pub fn press(key: u32) -> Self {
        Self::new(KeyEventType::Press, key)
    }

    pub fn release(key: u32) -> Self {
        Self::new(KeyEventType::Release, key)
    }
}

/// Screen rectangle, used for the input method area and preedit geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Label override for one key, set by the application's toolbar extension
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyOverride {
    pub label: Option<String>,
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub highlighted: bool,
}

fn default_true() -> bool {
    true
}
