mod common;

use common::*;
use imserver_core::settings::keys;
use imserver_core::{
    plugin_state, ConnectionEvent, HandlerState, MemorySettings, PluginManager, PluginState, SettingsBackend,
    SwitchDirection,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn three_keyboards() -> Fixture {
    Fixture::new(&[
        ("a.spy", PluginSpec::onscreen("Latin", &["en", "fr"])),
        ("b.spy", PluginSpec::onscreen("Japanese", &["ja"])),
        ("c.spy", PluginSpec::onscreen("Korean", &["ko"])),
    ])
}

fn all_enabled() -> MemorySettings {
    MemorySettings::with_values([
        (
            keys::ONSCREEN_ENABLED,
            json!(["a.spy:en", "a.spy:fr", "b.spy:ja", "c.spy:ko"]),
        ),
        (keys::ONSCREEN_ACTIVE, json!("a.spy:en")),
    ])
}

fn start(fixture: &Fixture, settings: MemorySettings) -> PluginManager {
    let manager = fixture.manager(settings).expect("plugins load");
    fixture.take_calls();
    manager
}

fn request_switch(fixture: &Fixture, manager: &mut PluginManager, from: &str, direction: SwitchDirection) {
    fixture.host(from).switch_plugin(direction);
    manager.process_host_requests();
    manager.process_settings_changes().expect("settings");
}

#[test]
fn test_startup_activates_persisted_subview_plugin() {
    let fixture = three_keyboards();
    let manager = fixture.manager(all_enabled()).expect("plugins load");

    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
    assert_eq!(manager.resolve(HandlerState::OnScreen), Some("a.spy"));
    assert_eq!(manager.active_subview(HandlerState::OnScreen).as_deref(), Some("en"));
    assert!(fixture.host("a.spy").is_enabled());
    assert!(!fixture.host("b.spy").is_enabled());
    assert_eq!(
        fixture.take_calls_of("a.spy"),
        vec![
            "orientation:0",
            "set_state:onscreen",
            "set_active_subview:en",
            "key_overrides:0",
            "set_state:onscreen",
        ]
    );
}

#[test]
fn test_replacement_shown_before_source_hidden() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());
    manager.handle_event(ConnectionEvent::ShowInputMethod).expect("show");
    fixture.take_calls();

    request_switch(&fixture, &mut manager, "a.spy", SwitchDirection::Forward);

    let calls = fixture.take_calls();
    assert_eq!(
        calls,
        vec![
            "b.spy:orientation:0",
            "b.spy:set_state:onscreen",
            "b.spy:key_overrides:0",
            "b.spy:show",
            "b.spy:language_notification",
            "a.spy:hide",
            "a.spy:reset",
        ]
    );
    assert_eq!(manager.active_plugin_names(), vec!["b.spy"]);
    assert_eq!(manager.plugin_state("a.spy"), Some(Default::default()));
    assert!(!fixture.host("a.spy").is_enabled());
    assert_eq!(manager.settings().string_value(keys::ONSCREEN_ACTIVE).as_deref(), Some("b.spy:ja"));
}

#[test]
fn test_forward_ring_visits_every_plugin() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    let mut visited = Vec::new();
    let mut current = "a.spy".to_string();
    for _ in 0..3 {
        request_switch(&fixture, &mut manager, &current, SwitchDirection::Forward);
        current = manager.active_plugin_name(HandlerState::OnScreen).expect("onscreen owner");
        visited.push(current.clone());
        assert_eq!(manager.active_plugin_names(), vec![current.clone()]);
    }

    assert_eq!(visited, vec!["b.spy", "c.spy", "a.spy"]);
}

#[test]
fn test_backward_wraps_and_enters_last_context() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    request_switch(&fixture, &mut manager, "a.spy", SwitchDirection::Backward);

    assert_eq!(manager.active_plugin_names(), vec!["c.spy"]);
    // a plugin never switched away from enters backwards at its last context
    assert!(fixture
        .take_calls_of("c.spy")
        .contains(&"switch_context:backward:false".to_string()));
}

#[test]
fn test_returning_in_same_direction_resumes_context() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    request_switch(&fixture, &mut manager, "a.spy", SwitchDirection::Forward);
    request_switch(&fixture, &mut manager, "b.spy", SwitchDirection::Forward);
    fixture.take_calls();
    request_switch(&fixture, &mut manager, "c.spy", SwitchDirection::Forward);

    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
    assert!(fixture
        .take_calls_of("a.spy")
        .contains(&"switch_context:forward:false".to_string()));
}

#[test]
fn test_lone_plugin_switches_its_own_context() {
    let fixture = Fixture::new(&[("a.spy", PluginSpec::onscreen("Latin", &["en", "fr"]))]);
    let mut manager = start(&fixture, MemorySettings::new());

    assert!(!manager.switch_plugin(SwitchDirection::Forward, "a.spy"));
    assert_eq!(fixture.take_calls_of("a.spy"), vec!["switch_context:forward:true"]);
    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
}

#[test]
fn test_candidate_must_support_owned_states() {
    let fixture = Fixture::new(&[
        ("a.spy", PluginSpec::onscreen("Latin", &["en"])),
        ("h.spy", PluginSpec::new("Tracker", &[HandlerState::Hardware])),
    ]);
    let mut manager = start(&fixture, MemorySettings::new());

    assert!(!manager.switch_plugin(SwitchDirection::Forward, "a.spy"));
    assert!(!manager.switch_plugin_to("h.spy", Some("a.spy"), None));
    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
    assert_eq!(manager.resolve(HandlerState::OnScreen), Some("a.spy"));
    assert!(!manager.is_active("h.spy"));
}

#[test]
fn test_disabled_subview_plugin_is_skipped() {
    let fixture = three_keyboards();
    let settings = MemorySettings::with_values([
        (keys::ONSCREEN_ENABLED, json!(["a.spy:en", "b.spy:ja"])),
        (keys::ONSCREEN_ACTIVE, json!("b.spy:ja")),
    ]);
    let mut manager = start(&fixture, settings);
    assert_eq!(manager.active_plugin_names(), vec!["b.spy"]);

    assert!(!manager.switch_plugin_to("c.spy", Some("b.spy"), None));
    request_switch(&fixture, &mut manager, "b.spy", SwitchDirection::Forward);
    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
}

#[test]
fn test_switch_to_by_id() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    assert!(manager.switch_plugin_to("c.spy", Some("a.spy"), None));
    assert_eq!(manager.active_plugin_names(), vec!["c.spy"]);
    assert_eq!(manager.resolve(HandlerState::OnScreen), Some("c.spy"));

    // switching to oneself succeeds without doing anything
    fixture.take_calls();
    assert!(manager.switch_plugin_to("c.spy", Some("c.spy"), None));
    assert!(fixture.take_calls().is_empty());

    assert!(!manager.switch_plugin_to("missing.spy", Some("c.spy"), None));
    assert!(!manager.switch_plugin_to("a.spy", Some("missing.spy"), None));
    // c already owns OnScreen
    assert!(manager.switch_plugin_to("c.spy", None, None));
    assert_eq!(manager.active_plugin_names(), vec!["c.spy"]);
}

#[test]
fn test_switch_without_initiator_replaces_on_screen_owner() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());
    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);

    assert!(manager.switch_plugin_to("b.spy", None, None));
    assert_eq!(manager.active_plugin_names(), vec!["b.spy"]);
    assert_eq!(manager.plugin_state("a.spy"), Some(PluginState::new()));
    assert_eq!(
        manager.plugin_state("b.spy"),
        Some(plugin_state(&[HandlerState::OnScreen]))
    );
    assert_eq!(manager.resolve(HandlerState::OnScreen), Some("b.spy"));
    assert_eq!(
        manager.settings().string_value(keys::ONSCREEN_ACTIVE).as_deref(),
        Some("b.spy:ja")
    );
}

#[test]
fn test_switch_to_selects_requested_subview() {
    let fixture = three_keyboards();
    let settings = MemorySettings::with_values([
        (
            keys::ONSCREEN_ENABLED,
            json!(["a.spy:en", "a.spy:fr", "b.spy:ja", "c.spy:ko"]),
        ),
        (keys::ONSCREEN_ACTIVE, json!("b.spy:ja")),
    ]);
    let mut manager = start(&fixture, settings);

    assert!(manager.switch_plugin_to("a.spy", Some("b.spy"), Some("fr")));
    assert!(fixture
        .take_calls_of("a.spy")
        .contains(&"set_active_subview:fr".to_string()));
    assert_eq!(manager.active_subview(HandlerState::OnScreen).as_deref(), Some("fr"));
    assert_eq!(
        manager.settings().string_value(keys::ONSCREEN_ACTIVE).as_deref(),
        Some("a.spy:fr")
    );
}

#[test]
fn test_switch_request_with_subview() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    fixture.host("b.spy").switch_plugin_to("a.spy", None);
    fixture.host("a.spy").switch_plugin_to("b.spy", Some("ja".to_string()));
    manager.process_host_requests();

    // b is inactive, its request was dropped
    assert_eq!(manager.active_plugin_names(), vec!["b.spy"]);
    assert!(fixture
        .take_calls_of("b.spy")
        .contains(&"set_active_subview:ja".to_string()));
}

#[test]
fn test_activation_is_idempotent() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());
    let onscreen = plugin_state(&[HandlerState::OnScreen]);

    // a is already active, routing OnScreen to it again only pushes the state
    manager.set_active_handlers(&onscreen);
    manager.set_active_handlers(&onscreen);
    assert_eq!(
        fixture.take_calls_of("a.spy"),
        vec!["set_state:onscreen", "set_state:onscreen"]
    );

    assert!(manager.deactivate("a.spy"));
    assert!(manager.deactivate("a.spy"));
    assert_eq!(fixture.take_calls_of("a.spy"), vec!["hide", "reset"]);
    assert!(manager.active_plugin_names().is_empty());
    assert_eq!(manager.plugin_state("a.spy"), Some(PluginState::new()));

    assert!(!manager.deactivate("missing.spy"));
}

#[test]
fn test_activation_replays_orientation() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    manager
        .handle_event(ConnectionEvent::OrientationChanged { angle: 90 })
        .expect("orientation");
    assert!(manager.switch_plugin_to("b.spy", Some("a.spy"), None));

    assert_eq!(fixture.take_calls_of("b.spy")[0], "orientation:90");
}

#[test]
fn test_set_active_subview_gating() {
    let fixture = three_keyboards();
    let settings = MemorySettings::with_values([
        (keys::ONSCREEN_ENABLED, json!(["a.spy:en", "b.spy:ja"])),
        (keys::ONSCREEN_ACTIVE, json!("a.spy:en")),
    ]);
    let mut manager = start(&fixture, settings);

    assert!(!manager.set_active_subview("fr", HandlerState::OnScreen));
    assert!(!manager.set_active_subview("en", HandlerState::Hardware));
    assert!(!manager.set_active_subview("xx", HandlerState::OnScreen));

    manager
        .settings_mut()
        .set(keys::ONSCREEN_ENABLED, json!(["a.spy:en", "a.spy:fr", "b.spy:ja"]))
        .expect("set");
    manager.process_settings_changes().expect("settings");
    fixture.take_calls();

    assert!(manager.set_active_subview("fr", HandlerState::OnScreen));
    assert_eq!(fixture.take_calls_of("a.spy"), vec!["set_active_subview:fr"]);
    assert_eq!(manager.active_subview(HandlerState::OnScreen).as_deref(), Some("fr"));
    assert_eq!(manager.settings().string_value(keys::ONSCREEN_ACTIVE).as_deref(), Some("a.spy:fr"));
}

#[test]
fn test_external_active_subview_change_switches_plugin() {
    let fixture = three_keyboards();
    let mut manager = start(&fixture, all_enabled());

    manager
        .settings_mut()
        .set(keys::ONSCREEN_ACTIVE, json!("b.spy:ja"))
        .expect("set");
    manager.process_settings_changes().expect("settings");

    assert_eq!(manager.active_plugin_names(), vec!["b.spy"]);
    assert!(fixture
        .take_calls_of("b.spy")
        .contains(&"set_active_subview:ja".to_string()));

    // a change back to the other subview of the same plugin
    manager
        .settings_mut()
        .set(keys::ONSCREEN_ACTIVE, json!("a.spy:fr"))
        .expect("set");
    manager.process_settings_changes().expect("settings");
    assert_eq!(manager.active_plugin_names(), vec!["a.spy"]);
    assert_eq!(manager.active_subview(HandlerState::OnScreen).as_deref(), Some("fr"));
}

#[test]
fn test_surrounding_subviews() {
    let fixture = three_keyboards();
    let manager = start(&fixture, all_enabled());

    let around: Vec<String> = manager
        .surrounding_subview_descriptions(HandlerState::OnScreen)
        .into_iter()
        .map(|d| format!("{}:{}", d.plugin_id, d.id))
        .collect();
    assert_eq!(around, vec!["c.spy:ko", "a.spy:fr"]);
}

#[test]
fn test_surrounding_subviews_empty_for_single_subview() {
    let fixture = Fixture::new(&[("a.spy", PluginSpec::onscreen("Latin", &["en"]))]);
    let manager = start(&fixture, MemorySettings::new());

    assert!(manager
        .surrounding_subview_descriptions(HandlerState::OnScreen)
        .is_empty());
}
