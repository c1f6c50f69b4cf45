use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Input role a plugin can fulfil
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerState {
    /// On-screen (virtual) keyboard
    OnScreen,
    /// Physical keyboard attached to the device
    Hardware,
    /// Accessory input such as a remote control keyboard
    Accessory,
}

impl HandlerState {
    pub const ALL: [HandlerState; 3] = [
        HandlerState::OnScreen,
        HandlerState::Hardware,
        HandlerState::Accessory,
    ];

    /// Name used for the persisted handler assignment.
    ///
    /// OnScreen has none: its owner follows the active on-screen subview.
    pub fn setting_name(self) -> Option<&'static str> {
        match self {
            HandlerState::OnScreen => None,
            HandlerState::Hardware => Some("hardware"),
            HandlerState::Accessory => Some("accessory"),
        }
    }
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerState::OnScreen => write!(f, "onscreen"),
            HandlerState::Hardware => write!(f, "hardware"),
            HandlerState::Accessory => write!(f, "accessory"),
        }
    }
}

/// The set of handler states routed to one plugin
pub type PluginState = BTreeSet<HandlerState>;

/// Intent of a plugin switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchDirection {
    #[default]
    Undefined,
    Forward,
    Backward,
}

/// Builds a [`PluginState`] from a slice of states
pub fn plugin_state(states: &[HandlerState]) -> PluginState {
    states.iter().copied().collect()
}
