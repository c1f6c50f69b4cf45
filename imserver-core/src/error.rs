//! Error types for the input method server core

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No plugins were loaded")]
    NoPluginsLoaded,

    #[error("Plugin load error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a plugin file is rejected
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("{0} is disabled in settings")]
    Disabled(String),

    #[error("{0} is already known as not a valid plugin")]
    Blacklisted(PathBuf),

    #[error("{path} could not be loaded: {message}")]
    Load { path: PathBuf, message: String },

    #[error("{0} does not support any state")]
    NoSupportedStates(PathBuf),

    #[error("creating the input method of {0} failed")]
    CreateFailed(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
