//! Boundary to the application side
//!
//! Transports turn their wire messages into [`ClientMessage`]s, the
//! [`ConnectionContext`] keeps track of the active client and yields the
//! [`ConnectionEvent`]s the plugin manager handles. Outbound traffic goes
//! through [`InputContextConnection`].

use crate::manager::PluginSettingsInfo;
use crate::types::{KeyEvent, KeyOverrides, Point, Rect};
use crate::widget::WidgetState;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConnectionEvent {
    WidgetStateChanged {
        client_id: u32,
        state: WidgetState,
        #[serde(default)]
        focus_changed: bool,
    },
    ClientActivated {
        client_id: u32,
    },
    ClientDisconnected {
        client_id: u32,
    },
    ActiveClientDisconnected,
    KeyEvent {
        event: KeyEvent,
    },
    PreeditChanged {
        text: String,
        #[serde(default)]
        cursor_pos: i32,
    },
    OrientationAboutToChange {
        angle: i32,
    },
    OrientationChanged {
        angle: i32,
    },
    ShowInputMethod,
    HideInputMethod,
    ResetInputMethod,
    MouseClickedOnPreedit {
        pos: Point,
        preedit_rect: Rect,
    },
    PluginSettingsRequested {
        client_id: u32,
        #[serde(default)]
        language: String,
    },
    AppFocusChanged {
        win_id: u64,
    },
    ToolbarChanged {
        id: i32,
        #[serde(default)]
        overrides: KeyOverrides,
    },
    KeyOverridesChanged {
        #[serde(default)]
        overrides: KeyOverrides,
    },
    GlobalAttributeChanged {
        target: String,
        #[serde(default)]
        target_item: String,
        attribute: String,
        value: Value,
    },
    /// Reported by the hardware keyboard tracker of the platform layer
    HardwareKeyboardChanged {
        open: bool,
    },
}

impl ConnectionEvent {
    /// Events only honoured when they come from the active connection
    fn requires_active_connection(&self) -> bool {
        matches!(
            self,
            ConnectionEvent::KeyEvent { .. }
                | ConnectionEvent::PreeditChanged { .. }
                | ConnectionEvent::OrientationAboutToChange { .. }
                | ConnectionEvent::OrientationChanged { .. }
                | ConnectionEvent::ShowInputMethod
                | ConnectionEvent::HideInputMethod
                | ConnectionEvent::ResetInputMethod
                | ConnectionEvent::MouseClickedOnPreedit { .. }
        )
    }
}

/// Message as received from a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "camelCase")]
pub enum ClientMessage {
    Activate { connection: u32 },
    Disconnect { connection: u32 },
    Event { connection: u32, event: ConnectionEvent },
}

/// Outbound commands towards the application
pub trait InputContextConnection {
    fn update_input_method_area(&mut self, area: Rect) -> Result<()>;

    fn notify_extended_attribute_changed(
        &mut self,
        id: i32,
        target: &str,
        target_item: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()>;

    fn plugin_settings_loaded(&mut self, client_id: u32, info: &[PluginSettingsInfo]) -> Result<()>;

    fn send_commit_string(
        &mut self,
        text: &str,
        replace_start: i32,
        replace_length: i32,
        cursor_pos: i32,
    ) -> Result<()>;

    fn send_key_event(&mut self, event: &KeyEvent) -> Result<()>;
}

/// Tracks which client connection is active
///
/// Connection id 0 means no active connection.
#[derive(Debug, Default)]
pub struct ConnectionContext {
    active: u32,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_connection(&self) -> u32 {
        self.active
    }

    pub fn activate_context(&mut self, connection: u32) -> Vec<ConnectionEvent> {
        if connection == self.active {
            return Vec::new();
        }
        self.active = connection;
        if connection == 0 {
            return Vec::new();
        }
        vec![ConnectionEvent::ClientActivated {
            client_id: connection,
        }]
    }

    pub fn handle_disconnection(&mut self, connection: u32) -> Vec<ConnectionEvent> {
        let mut events = vec![ConnectionEvent::ClientDisconnected {
            client_id: connection,
        }];
        if connection == self.active {
            self.active = 0;
            events.push(ConnectionEvent::ActiveClientDisconnected);
        }
        events
    }

    pub fn route(&mut self, message: ClientMessage) -> Vec<ConnectionEvent> {
        match message {
            ClientMessage::Activate { connection } => self.activate_context(connection),
            ClientMessage::Disconnect { connection } => self.handle_disconnection(connection),
            ClientMessage::Event { connection, event } => {
                if event.requires_active_connection() && connection != self.active {
                    log::debug!("Ignoring {:?} from inactive connection {}", event, connection);
                    return Vec::new();
                }
                vec![event]
            }
        }
    }
}
