mod common;

use common::*;
use imserver_core::settings::keys;
use imserver_core::widget::{attributes, WidgetState};
use imserver_core::{
    plugin_state, ClientMessage, ConnectionContext, ConnectionEvent, HandlerState, KeyEvent, KeyOverride,
    KeyOverrides, MemorySettings, PluginManager, Point, Rect,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Manager with `a` serving OnScreen and `b` serving Hardware next to it
fn two_targets() -> (Fixture, PluginManager) {
    let fixture = Fixture::new(&[
        ("a.spy", PluginSpec::onscreen("Latin", &["en"])),
        ("b.spy", PluginSpec::new("Tracker", &[HandlerState::Hardware])),
    ]);
    let settings = MemorySettings::with_values([
        (keys::ONSCREEN_ACTIVE, json!("a.spy:en")),
        (keys::handler("hardware").as_str(), json!("b.spy")),
    ]);
    let mut manager = fixture.manager(settings).expect("plugins load");
    manager.set_active_handlers(&plugin_state(&[HandlerState::OnScreen, HandlerState::Hardware]));
    assert_eq!(manager.active_plugin_names(), vec!["a.spy", "b.spy"]);
    fixture.take_calls();
    (fixture, manager)
}

fn widget(values: &[(&str, Value)]) -> WidgetState {
    values.iter().map(|(k, v)| (*k, v.clone())).collect()
}

fn widget_changed(manager: &mut PluginManager, state: WidgetState, focus_changed: bool) {
    manager
        .handle_event(ConnectionEvent::WidgetStateChanged {
            client_id: 1,
            state,
            focus_changed,
        })
        .expect("widget event");
}

#[test]
fn test_focus_in_dispatch_order() {
    let (fixture, mut manager) = two_targets();

    let state = widget(&[
        (attributes::FOCUS_STATE, json!(true)),
        (attributes::CONTENT_TYPE, json!(0)),
        (attributes::VISUALIZATION_PRIORITY, json!(true)),
    ]);
    widget_changed(&mut manager, state, true);

    assert_eq!(
        fixture.take_calls(),
        vec![
            "a.spy:focus:true",
            "b.spy:focus:true",
            "a.spy:visualization:true",
            "b.spy:visualization:true",
            "a.spy:update_event:contentType,focusState,visualizationPriority",
            "a.spy:update",
            "b.spy:update_event:contentType,focusState,visualizationPriority",
            "b.spy:update",
        ]
    );
    assert_eq!(manager.widget_state().content_type().map(|c| c.name()), Some("text"));
}

#[test]
fn test_unchanged_state_only_updates() {
    let (fixture, mut manager) = two_targets();
    let state = widget(&[(attributes::FOCUS_STATE, json!(true))]);
    widget_changed(&mut manager, state.clone(), true);
    fixture.take_calls();

    widget_changed(&mut manager, state, false);
    assert_eq!(fixture.take_calls(), vec!["a.spy:update", "b.spy:update"]);
}

#[test]
fn test_only_differing_keys_reported() {
    let (fixture, mut manager) = two_targets();
    widget_changed(
        &mut manager,
        widget(&[
            (attributes::FOCUS_STATE, json!(true)),
            (attributes::SURROUNDING_TEXT, json!("ab")),
            (attributes::CURSOR_POSITION, json!(2)),
        ]),
        true,
    );
    fixture.take_calls();

    widget_changed(
        &mut manager,
        widget(&[
            (attributes::FOCUS_STATE, json!(true)),
            (attributes::SURROUNDING_TEXT, json!("abc")),
            (attributes::CURSOR_POSITION, json!(3)),
        ]),
        false,
    );
    assert_eq!(
        only(&fixture.take_calls(), &["update_event"]),
        vec![
            "a.spy:update_event:cursorPosition,surroundingText",
            "b.spy:update_event:cursorPosition,surroundingText",
        ]
    );
}

#[test]
fn test_focus_out_hides_active_plugins() {
    let (fixture, mut manager) = two_targets();
    manager.handle_event(ConnectionEvent::ShowInputMethod).expect("show");
    widget_changed(&mut manager, widget(&[(attributes::FOCUS_STATE, json!(true))]), true);
    fixture.take_calls();

    widget_changed(&mut manager, widget(&[(attributes::FOCUS_STATE, json!(false))]), true);

    assert_eq!(
        fixture.take_calls(),
        vec![
            "a.spy:focus:false",
            "b.spy:focus:false",
            "a.spy:update_event:focusState",
            "a.spy:update",
            "b.spy:update_event:focusState",
            "b.spy:update",
            "a.spy:hide",
            "b.spy:hide",
        ]
    );
    assert!(!manager.is_visible());
}

#[test]
fn test_client_disconnection_is_focus_loss() {
    let (fixture, mut manager) = two_targets();
    manager.handle_client_connection();
    widget_changed(&mut manager, widget(&[(attributes::FOCUS_STATE, json!(true))]), true);
    fixture.take_calls();

    manager
        .handle_event(ConnectionEvent::ActiveClientDisconnected)
        .expect("disconnect");

    assert_eq!(
        fixture.take_calls(),
        vec![
            "a.spy:client_change",
            "b.spy:client_change",
            "a.spy:focus:false",
            "b.spy:focus:false",
            "a.spy:update",
            "b.spy:update",
            "a.spy:hide",
            "b.spy:hide",
        ]
    );
    assert!(manager.widget_state().is_empty());
    assert!(!manager.is_client_connected());
}

#[test]
fn test_passthrough_events_reach_active_plugins() {
    let (fixture, mut manager) = two_targets();
    manager.deactivate("b.spy");
    fixture.take_calls();

    let events = vec![
        ConnectionEvent::KeyEvent {
            event: KeyEvent::press(65),
        },
        ConnectionEvent::PreeditChanged {
            text: "ka".into(),
            cursor_pos: 1,
        },
        ConnectionEvent::MouseClickedOnPreedit {
            pos: Point { x: 4, y: 2 },
            preedit_rect: Rect::new(0, 0, 10, 10),
        },
        ConnectionEvent::OrientationAboutToChange { angle: 270 },
        ConnectionEvent::ResetInputMethod,
    ];
    for event in events {
        manager.handle_event(event).expect("event");
    }

    assert_eq!(
        fixture.take_calls(),
        vec![
            "a.spy:key:65",
            "a.spy:preedit:ka:1",
            "a.spy:preedit_click:4,2",
            "a.spy:orientation_about_to_change:270",
            "a.spy:reset",
        ]
    );
}

#[test]
fn test_routed_client_messages() {
    let (fixture, mut manager) = two_targets();
    let mut context = ConnectionContext::new();

    let messages = vec![
        ClientMessage::Activate { connection: 3 },
        ClientMessage::Event {
            connection: 4,
            event: ConnectionEvent::KeyEvent {
                event: KeyEvent::press(66),
            },
        },
        ClientMessage::Event {
            connection: 3,
            event: ConnectionEvent::KeyEvent {
                event: KeyEvent::press(67),
            },
        },
    ];
    for message in messages {
        for event in context.route(message) {
            manager.handle_event(event).expect("event");
        }
    }

    assert_eq!(
        only(&fixture.take_calls(), &["client_change", "key"]),
        vec!["a.spy:client_change", "b.spy:client_change", "a.spy:key:67", "b.spy:key:67"]
    );
    assert!(manager.is_client_connected());
}

#[test]
fn test_toolbar_overrides() {
    let (fixture, mut manager) = two_targets();
    manager.deactivate("b.spy");
    fixture.take_calls();

    // nothing to override without a focused widget
    manager
        .handle_event(ConnectionEvent::ToolbarChanged {
            id: 1,
            overrides: KeyOverrides::new(),
        })
        .expect("toolbar");
    assert!(fixture.take_calls().is_empty());

    let mut overrides = KeyOverrides::new();
    overrides.insert(
        "actionKey".into(),
        KeyOverride {
            label: Some("Go".into()),
            enabled: true,
            ..KeyOverride::default()
        },
    );
    manager
        .handle_event(ConnectionEvent::ToolbarChanged { id: 2, overrides })
        .expect("toolbar");
    assert_eq!(fixture.take_calls(), vec!["a.spy:key_overrides:1"]);

    manager
        .handle_event(ConnectionEvent::KeyOverridesChanged {
            overrides: KeyOverrides::new(),
        })
        .expect("overrides");
    assert_eq!(fixture.take_calls(), vec!["a.spy:key_overrides:0"]);
}
