use super::{UpdateEvent, WidgetState};
use crate::plugin::InputMethod;
use std::collections::BTreeMap;

/// One widget state transition
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetStateChange {
    pub client_id: u32,
    pub previous: WidgetState,
    pub current: WidgetState,
    pub changed_keys: Vec<String>,
    pub focus_changed: bool,
}

impl WidgetStateChange {
    pub fn has_focus(&self) -> bool {
        self.current.focus_state().unwrap_or(false)
    }

    /// New visualization priority when it toggled
    pub fn visualization_priority_change(&self) -> Option<bool> {
        let old = self.previous.visualization_priority().unwrap_or(false);
        let new = self.current.visualization_priority().unwrap_or(false);
        (old != new).then_some(new)
    }

    pub fn update_event(&self) -> UpdateEvent {
        UpdateEvent::new(
            self.current.clone(),
            self.changed_keys.clone(),
            self.previous.input_method_hints().unwrap_or(0),
        )
    }
}

/// Keys of `new` whose value differs from `old`
///
/// Keys only present in `old` are not reported.
pub fn changed_keys(old: &WidgetState, new: &WidgetState) -> Vec<String> {
    new.iter()
        .filter(|(key, value)| old.get(key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Holds the last widget state received from the active client
#[derive(Debug, Default)]
pub struct WidgetStateTracker {
    state: WidgetState,
    client_id: u32,
    version: u64,
}

impl WidgetStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &WidgetState {
        &self.state
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Bumped on every replacement of the stored state
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn update(&mut self, client_id: u32, state: WidgetState, focus_changed: bool) -> WidgetStateChange {
        let changed_keys = changed_keys(&self.state, &state);
        let previous = std::mem::replace(&mut self.state, state.clone());
        self.client_id = client_id;
        self.version += 1;
        WidgetStateChange {
            client_id,
            previous,
            current: state,
            changed_keys,
            focus_changed,
        }
    }

    /// Forgets the state of a disconnected client, reported as a focus loss
    pub fn clear(&mut self) -> WidgetStateChange {
        let client_id = self.client_id;
        self.client_id = 0;
        let mut change = self.update(0, WidgetState::new(), true);
        change.client_id = client_id;
        change
    }
}

/// Ordered input methods receiving widget notifications
pub trait WidgetTargets {
    fn for_each_target(&mut self, f: &mut dyn FnMut(&mut dyn InputMethod));
}

impl WidgetTargets for Vec<Box<dyn InputMethod>> {
    fn for_each_target(&mut self, f: &mut dyn FnMut(&mut dyn InputMethod)) {
        for target in self.iter_mut() {
            f(target.as_mut());
        }
    }
}

impl<K: Ord> WidgetTargets for BTreeMap<K, Box<dyn InputMethod>> {
    fn for_each_target(&mut self, f: &mut dyn FnMut(&mut dyn InputMethod)) {
        for target in self.values_mut() {
            f(target.as_mut());
        }
    }
}

/// Fans a change out to the targets
///
/// Every target sees the focus change before any target sees the
/// visualization change, and both before the update event. Returns true
/// when the widget has no focus and the active plugins must be hidden.
pub fn dispatch(change: &WidgetStateChange, targets: &mut dyn WidgetTargets) -> bool {
    let focus = change.has_focus();

    if change.focus_changed {
        targets.for_each_target(&mut |target: &mut dyn InputMethod| target.handle_focus_change(focus));
    }

    if let Some(priority) = change.visualization_priority_change() {
        targets.for_each_target(&mut |target: &mut dyn InputMethod| target.handle_visualization_priority_change(priority));
    }

    let event = change.update_event();
    targets.for_each_target(&mut |target: &mut dyn InputMethod| {
        if !change.changed_keys.is_empty() {
            target.ext_event(&event);
        }
        target.update();
    });

    !focus
}
