//! Glue between the transport, the plugin manager and the remote
//! keyboard service

use crate::stdio::{Inbound, Outbound, Output, ServiceCall};
use imserver_core::{
    ClientMessage, ConnectionContext, ConnectionEvent, Error, ManagerEvent, PluginManager, RemoteKeyboardService,
    Result,
};
use std::io::Write;
use std::time::Instant;

pub struct Server<W: Write> {
    manager: PluginManager,
    context: ConnectionContext,
    service: RemoteKeyboardService,
    output: Output<W>,
}

impl<W: Write> Server<W> {
    pub fn new(manager: PluginManager, output: Output<W>) -> Self {
        let mut server = Self {
            manager,
            context: ConnectionContext::new(),
            service: RemoteKeyboardService::new(),
            output,
        };
        server.forward_manager_events();
        server
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.manager.next_deadline()
    }

    /// Runs expired timers; true when the server should quit
    pub fn poll_timers(&mut self) -> bool {
        self.manager.poll_timers()
    }

    /// Handles one inbound line and flushes what it caused
    ///
    /// Fails only when the server cannot go on, i.e. when a plugin reload
    /// left no plugin loaded.
    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let result = match serde_json::from_str::<Inbound>(line) {
            Ok(Inbound::Client(message)) => self.handle_message(message),
            Ok(Inbound::Service(call)) => {
                self.handle_service_call(call);
                Ok(())
            }
            Err(e) => {
                log::warn!("Dropping malformed line: {}", e);
                Ok(())
            }
        };

        self.forward_manager_events();
        self.flush_broadcast();
        result
    }

    pub fn handle_message(&mut self, message: ClientMessage) -> Result<()> {
        for event in self.context.route(message) {
            let service_hint = match &event {
                ConnectionEvent::WidgetStateChanged { focus_changed, .. } => Some(*focus_changed),
                _ => None,
            };
            let reset = matches!(event, ConnectionEvent::ResetInputMethod);

            match self.manager.handle_event(event) {
                Err(Error::NoPluginsLoaded) => return Err(Error::NoPluginsLoaded),
                Err(e) => log::error!("Event handling failed: {}", e),
                Ok(()) => {}
            }

            if let Some(focus_changed) = service_hint {
                self.service.widget_state_changed(focus_changed);
            }
            if reset {
                self.service.reset_requested();
            }
        }
        Ok(())
    }

    pub fn handle_service_call(&mut self, call: ServiceCall) {
        if call.cancel {
            self.service.cancel_subscription(&call.token);
            return;
        }

        let widget = self.manager.widget_state().clone();
        let response = self.service.call(
            &call.method,
            &call.token,
            call.subscribe,
            &call.payload,
            &widget,
            self.manager.connection_mut(),
        );
        self.emit(&Outbound::ServiceResponse {
            token: &call.token,
            payload: &response,
        });
    }

    fn flush_broadcast(&mut self) {
        if let Some(payload) = self.service.take_broadcast(self.manager.widget_state()) {
            let subscribers: Vec<&str> = self.service.subscribers().collect();
            self.emit(&Outbound::ServiceBroadcast {
                subscribers,
                payload: &payload,
            });
        }
    }

    fn forward_manager_events(&mut self) {
        for event in self.manager.take_events() {
            match event {
                ManagerEvent::PluginsChanged => self.emit(&Outbound::PluginsChanged),
                ManagerEvent::PluginLoaded(id) => log::info!("Plugin {} loaded", id),
                ManagerEvent::PluginUnloaded(id) => log::info!("Plugin {} unloaded", id),
            }
        }
    }

    fn emit(&self, message: &Outbound<'_>) {
        if let Err(e) = self.output.emit(message) {
            log::warn!("Could not write {:?}: {}", message, e);
        }
    }
}
