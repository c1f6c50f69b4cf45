//! Input method plugin interfaces
//!
//! A plugin is a factory ([`InputMethodPlugin`]) producing one input method
//! instance ([`InputMethod`]) per load. The instance talks back to the
//! server only through its [`InputMethodHost`].

mod host;
mod loader;

pub use host::{HostRequest, InputMethodHost};
pub use loader::PluginLoader;

use crate::types::{
    HandlerState, KeyEvent, KeyOverrides, PluginState, Point, Rect, SubViewInfo, SwitchDirection,
};
use crate::widget::UpdateEvent;

pub trait InputMethodPlugin {
    fn name(&self) -> &str;

    /// Handler states this plugin can serve. Must not be empty.
    fn supported_states(&self) -> PluginState;

    fn version(&self) -> Option<String> {
        None
    }

    /// Creates the input method instance, or `None` when that fails
    fn create_input_method(&self, host: InputMethodHost) -> Option<Box<dyn InputMethod>>;
}

/// A live input method instance
///
/// Every hook has an empty default so implementations only override what
/// they react to.
#[allow(unused_variables)]
pub trait InputMethod {
    fn show(&mut self) {}
    fn hide(&mut self) {}
    fn reset(&mut self) {}

    fn set_state(&mut self, state: &PluginState) {}
    fn show_language_notification(&mut self) {}

    fn handle_app_orientation_about_to_change(&mut self, angle: i32) {}
    fn handle_app_orientation_changed(&mut self, angle: i32) {}
    fn handle_focus_change(&mut self, focus_in: bool) {}
    fn handle_visualization_priority_change(&mut self, priority: bool) {}
    fn handle_client_change(&mut self) {}
    fn handle_mouse_click_on_preedit(&mut self, pos: Point, preedit_rect: Rect) {}

    /// Returns true when the event was handled
    fn ext_event(&mut self, event: &UpdateEvent) -> bool {
        false
    }

    fn update(&mut self) {}
    fn set_preedit(&mut self, text: &str, cursor: i32) {}
    fn process_key_event(&mut self, event: &KeyEvent) {}

    /// Cycle subviews inside the plugin itself
    fn switch_context(&mut self, direction: SwitchDirection, animated: bool) {}

    fn subviews(&self, state: HandlerState) -> Vec<SubViewInfo> {
        Vec::new()
    }

    fn active_subview(&self, state: HandlerState) -> Option<String> {
        None
    }

    fn set_active_subview(&mut self, id: &str, state: HandlerState) {}
    fn set_key_overrides(&mut self, overrides: &KeyOverrides) {}
}
