//! Core of the imserver input method server
//!
//! Connects application text widgets with input method plugins: loads
//! the plugins, decides which one serves which input role and keeps the
//! widget state, settings and client lifecycle in sync with them.

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod locale;
pub mod manager;
pub mod plugin;
pub mod service;
pub mod settings;
pub mod types;
pub mod widget;

pub use types::*;

pub use connection::{ClientMessage, ConnectionContext, ConnectionEvent, InputContextConnection};
pub use error::{Error, PluginError, Result};
pub use manager::{ManagerContext, ManagerEvent, PluginManager};
pub use plugin::{InputMethod, InputMethodHost, InputMethodPlugin, PluginLoader};
pub use service::RemoteKeyboardService;
pub use settings::{FileSettings, MemorySettings, SettingsBackend};
