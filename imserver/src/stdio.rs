//! JSON lines transport
//!
//! Applications talk to the server one JSON object per line. Inbound lines
//! are either connection messages (tagged with `message`) or remote
//! keyboard service calls (carrying a `method`). Outbound lines are tagged
//! with `command`.

use imserver_core::manager::PluginSettingsInfo;
use imserver_core::{ClientMessage, InputContextConnection, KeyEvent, Rect};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Client(ClientMessage),
    Service(ServiceCall),
}

/// One remote keyboard service call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub method: String,
    /// Identifies the caller, also the subscription handle
    pub token: String,
    #[serde(default)]
    pub subscribe: bool,
    /// Ends the caller's subscription instead of calling
    #[serde(default)]
    pub cancel: bool,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound<'a> {
    UpdateInputMethodArea {
        area: Rect,
    },
    NotifyExtendedAttributeChanged {
        id: i32,
        target: &'a str,
        target_item: &'a str,
        attribute: &'a str,
        value: &'a Value,
    },
    PluginSettingsLoaded {
        client_id: u32,
        info: &'a [PluginSettingsInfo],
    },
    SendCommitString {
        text: &'a str,
        replace_start: i32,
        replace_length: i32,
        cursor_pos: i32,
    },
    SendKeyEvent {
        event: &'a KeyEvent,
    },
    ServiceResponse {
        token: &'a str,
        payload: &'a Value,
    },
    ServiceBroadcast {
        subscribers: Vec<&'a str>,
        payload: &'a Value,
    },
    PluginsChanged,
}

/// Shared line writer
pub struct Output<W: Write> {
    writer: Rc<RefCell<W>>,
}

impl<W: Write> Clone for Output<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}

impl<W: Write> Output<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Rc::new(RefCell::new(writer)),
        }
    }

    pub fn emit(&self, message: &Outbound<'_>) -> imserver_core::Result<()> {
        let mut writer = self.writer.borrow_mut();
        serde_json::to_writer(&mut *writer, message)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn with_writer<T>(&self, f: impl FnOnce(&mut W) -> T) -> T {
        f(&mut self.writer.borrow_mut())
    }
}

/// [`InputContextConnection`] writing commands as JSON lines
pub struct StdioConnection<W: Write> {
    output: Output<W>,
}

impl<W: Write> StdioConnection<W> {
    pub fn new(output: Output<W>) -> Self {
        Self { output }
    }
}

impl<W: Write> InputContextConnection for StdioConnection<W> {
    fn update_input_method_area(&mut self, area: Rect) -> imserver_core::Result<()> {
        self.output.emit(&Outbound::UpdateInputMethodArea { area })
    }

    fn notify_extended_attribute_changed(
        &mut self,
        id: i32,
        target: &str,
        target_item: &str,
        attribute: &str,
        value: &Value,
    ) -> imserver_core::Result<()> {
        self.output.emit(&Outbound::NotifyExtendedAttributeChanged {
            id,
            target,
            target_item,
            attribute,
            value,
        })
    }

    fn plugin_settings_loaded(&mut self, client_id: u32, info: &[PluginSettingsInfo]) -> imserver_core::Result<()> {
        self.output.emit(&Outbound::PluginSettingsLoaded { client_id, info })
    }

    fn send_commit_string(
        &mut self,
        text: &str,
        replace_start: i32,
        replace_length: i32,
        cursor_pos: i32,
    ) -> imserver_core::Result<()> {
        self.output.emit(&Outbound::SendCommitString {
            text,
            replace_start,
            replace_length,
            cursor_pos,
        })
    }

    fn send_key_event(&mut self, event: &KeyEvent) -> imserver_core::Result<()> {
        self.output.emit(&Outbound::SendKeyEvent { event })
    }
}
