//! Remote keyboard service
//!
//! Lets a remote keyboard (a phone app, a second screen) follow the
//! focused widget and type into it. Subscribers of
//! `registerRemoteKeyboard` receive a reduced widget snapshot; the other
//! methods turn into commit strings and key events on the active
//! connection.
//!
//! Broadcasts are deferred: widget changes only mark the service dirty and
//! the event loop collects the payload with
//! [`RemoteKeyboardService::take_broadcast`] once its queue is empty.

use crate::connection::InputContextConnection;
use crate::types::KeyEvent;
use crate::widget::WidgetState;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

pub const ERROR_CODE: i64 = -1000;

/// Bus methods served by [`RemoteKeyboardService`]
pub mod methods {
    pub const REGISTER_REMOTE_KEYBOARD: &str = "registerRemoteKeyboard";
    pub const INSERT_TEXT: &str = "insertText";
    pub const DELETE_CHARACTERS: &str = "deleteCharacters";
    pub const SEND_ENTER_KEY: &str = "sendEnterKey";
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Must subscribe to registerRemoteKeyboard")]
    NotSubscribed,

    #[error("Missing \"text\" parameter")]
    MissingText,

    #[error("Unknown \"mode\"; supported modes are \"backspace\" and \"direct\"")]
    UnknownDeleteMode,

    #[error("Missing or invalid \"count\" parameter")]
    InvalidCount,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

/// How `deleteCharacters` removes text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Backspace key presses
    #[default]
    Backspace,
    /// Replacement through an empty commit string, single line only
    Direct,
}

impl DeleteMode {
    fn parse(mode: &str) -> Option<Self> {
        match mode {
            "backspace" => Some(DeleteMode::Backspace),
            "direct" => Some(DeleteMode::Direct),
            _ => None,
        }
    }
}

/// Reduced view of the focused widget for remote keyboards
///
/// Text content never leaves the server, only lengths and positions, and
/// not even those for hidden text.
pub fn widget_snapshot(state: &WidgetState) -> Map<String, Value> {
    let mut snapshot = Map::new();

    if let Some(focus) = state.focus_state() {
        snapshot.insert("focus".into(), Value::Bool(focus));
    }
    if let Some(enabled) = state.correction_enabled() {
        snapshot.insert("correctionEnabled".into(), Value::Bool(enabled));
    }
    if let Some(enabled) = state.prediction_enabled() {
        snapshot.insert("predictionEnabled".into(), Value::Bool(enabled));
    }
    if let Some(enabled) = state.auto_capitalization_enabled() {
        snapshot.insert("autoCapitalizationEnabled".into(), Value::Bool(enabled));
    }

    let hidden_text = state.hidden_text();
    if let Some(hidden) = hidden_text {
        snapshot.insert("hiddenText".into(), Value::Bool(hidden));
    }
    let hidden = hidden_text.unwrap_or(false);

    if let Some((text, cursor)) = state.surrounding_text() {
        snapshot.insert("hasSurroundingText".into(), Value::Bool(!text.is_empty()));
        if !hidden {
            snapshot.insert("cursorPosition".into(), json!(cursor));
            snapshot.insert("surroundingTextLength".into(), json!(text.chars().count()));
        }
    }

    if state.has_selection() == Some(true) {
        snapshot.insert("hasSelection".into(), Value::Bool(true));
        if !hidden {
            if let Some(anchor) = state.anchor_position() {
                snapshot.insert("anchorPosition".into(), json!(anchor));
            }
        }
    }

    if let Some(content_type) = state.content_type() {
        snapshot.insert("contentType".into(), json!(content_type.name()));
    }
    if let Some(enter_key_type) = state.enter_key_type() {
        snapshot.insert("enterKeyType".into(), json!(enter_key_type));
    }

    snapshot
}

fn reply_true() -> Value {
    json!({ "returnValue": true })
}

fn reply_error(error: &ServiceError) -> Value {
    json!({
        "returnValue": false,
        "errorCode": ERROR_CODE,
        "errorText": error.to_string(),
    })
}

#[derive(Debug, Default)]
pub struct RemoteKeyboardService {
    subscribers: BTreeSet<String>,
    last_widget_state: Option<Map<String, Value>>,
    focus_changed_since_last_broadcast: bool,
    broadcast_pending: bool,
}

impl RemoteKeyboardService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &str> {
        self.subscribers.iter().map(String::as_str)
    }

    /// Answers one bus call
    ///
    /// `token` identifies the caller, `subscribe` tells whether the call
    /// asked for a subscription. The widget state and connection belong to
    /// the active client.
    pub fn call(
        &mut self,
        method: &str,
        token: &str,
        subscribe: bool,
        payload: &Value,
        widget: &WidgetState,
        connection: &mut dyn InputContextConnection,
    ) -> Value {
        let result = match method {
            methods::REGISTER_REMOTE_KEYBOARD => {
                return match self.register(token, subscribe, widget) {
                    Ok(response) => response,
                    Err(e) => reply_error(&e),
                };
            }
            methods::INSERT_TEXT => insert_text(payload, widget, connection),
            methods::DELETE_CHARACTERS => delete_characters(payload, widget, connection),
            methods::SEND_ENTER_KEY => {
                send(connection.send_key_event(&KeyEvent::press(KeyEvent::KEY_RETURN)));
                Ok(())
            }
            other => Err(ServiceError::UnknownMethod(other.to_string())),
        };

        match result {
            Ok(()) => reply_true(),
            Err(e) => {
                log::warn!("{} failed: {}", method, e);
                reply_error(&e)
            }
        }
    }

    fn register(&mut self, token: &str, subscribe: bool, widget: &WidgetState) -> Result<Value, ServiceError> {
        if !subscribe {
            return Err(ServiceError::NotSubscribed);
        }

        log::info!("registering remote keyboard {}", token);
        self.subscribers.insert(token.to_string());

        let mut response = json!({ "subscribed": true, "returnValue": true });
        let snapshot = widget_snapshot(widget);
        if !snapshot.is_empty() {
            response["currentWidget"] = Value::Object(snapshot);
        }
        Ok(response)
    }

    pub fn cancel_subscription(&mut self, token: &str) {
        self.subscribers.remove(token);
        if self.subscribers.is_empty() {
            log::info!("all remote keyboard clients disconnected");
        }
    }

    pub fn widget_state_changed(&mut self, focus_changed: bool) {
        if focus_changed {
            self.focus_changed_since_last_broadcast = true;
        }
        if self.has_subscribers() {
            self.broadcast_pending = true;
        }
    }

    /// A reset counts as a focus change for remote keyboards
    pub fn reset_requested(&mut self) {
        self.focus_changed_since_last_broadcast = true;
        self.broadcast_pending = true;
    }

    pub fn is_broadcast_pending(&self) -> bool {
        self.broadcast_pending
    }

    /// Payload for all subscribers, if a pending broadcast has news
    pub fn take_broadcast(&mut self, widget: &WidgetState) -> Option<Value> {
        if !std::mem::take(&mut self.broadcast_pending) {
            return None;
        }

        let snapshot = widget_snapshot(widget);
        let focus_changed = std::mem::take(&mut self.focus_changed_since_last_broadcast);
        let changed = self.last_widget_state.as_ref() != Some(&snapshot);

        let response = json!({
            "currentWidget": Value::Object(snapshot.clone()),
            "focusChanged": focus_changed,
        });
        self.last_widget_state = Some(snapshot);

        if (changed || focus_changed) && self.has_subscribers() {
            Some(response)
        } else {
            None
        }
    }
}

/// Logs and drops a failed outbound command
fn send(result: crate::Result<()>) {
    if let Err(e) = result {
        log::warn!("Could not reach the input context: {}", e);
    }
}

fn insert_text(
    payload: &Value,
    widget: &WidgetState,
    connection: &mut dyn InputContextConnection,
) -> Result<(), ServiceError> {
    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .ok_or(ServiceError::MissingText)?;
    let replace = payload.get("replace").and_then(Value::as_bool).unwrap_or(false);
    let length = payload
        .get("replaceLength")
        .and_then(Value::as_f64)
        .map(|l| l as i32)
        .unwrap_or(-1);

    if !replace {
        send(connection.send_commit_string(text, 0, 0, -1));
        return Ok(());
    }

    if length >= 0 {
        send(connection.send_commit_string(text, -length, length, -1));
    } else {
        // everything in the field
        let (surrounding, cursor) = widget.surrounding_text().unwrap_or(("", 0));
        let total = surrounding.chars().count() as i32;
        send(connection.send_commit_string(text, -(cursor as i32), total, -1));
    }
    Ok(())
}

fn delete_characters(
    payload: &Value,
    widget: &WidgetState,
    connection: &mut dyn InputContextConnection,
) -> Result<(), ServiceError> {
    let mode = match payload.get("mode") {
        Some(Value::String(mode)) => DeleteMode::parse(mode).ok_or(ServiceError::UnknownDeleteMode)?,
        _ => DeleteMode::default(),
    };
    let count = payload
        .get("count")
        .and_then(Value::as_f64)
        .filter(|count| *count > 0.0)
        .ok_or(ServiceError::InvalidCount)? as i32;

    match mode {
        DeleteMode::Direct => {
            let cursor = widget.surrounding_text().map_or(0, |(_, cursor)| cursor as i32);
            let count = count.min(cursor);
            send(connection.send_commit_string("", -count, count, -1));
        }
        DeleteMode::Backspace => {
            // one press clears the whole selection
            let presses = if widget.has_selection() == Some(true) { 1 } else { count };
            for _ in 0..presses {
                send(connection.send_key_event(&KeyEvent::press(KeyEvent::KEY_BACKSPACE)));
                send(connection.send_key_event(&KeyEvent::release(KeyEvent::KEY_BACKSPACE)));
            }
        }
    }
    Ok(())
}
