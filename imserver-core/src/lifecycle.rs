//! Client connection tracking and the shutdown timer
//!
//! A dynamic (non-static) server instance quits a while after its last
//! client went away. The timer is a deadline the event loop polls, so the
//! whole state machine stays on the event-loop thread.

use crate::settings::{keys, SettingsBackend};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: i64 = 10;

/// Delay of the timer a respawned dynamic instance starts with
pub const RESPAWN_SHUTDOWN_DELAY: Duration = Duration::from_secs(5);

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock advanced by hand, shared between its clones
#[derive(Debug, Clone)]
pub struct ManualClock(Rc<Cell<Instant>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

pub struct LifecycleCoordinator {
    clock: Rc<dyn Clock>,
    client_connected: bool,
    ever_connected: bool,
    deadline: Option<Instant>,
    terminate: Option<Box<dyn FnMut()>>,
    terminated: bool,
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("client_connected", &self.client_connected)
            .field("deadline", &self.deadline)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl LifecycleCoordinator {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            client_connected: false,
            ever_connected: false,
            deadline: None,
            terminate: None,
            terminated: false,
        }
    }

    /// Hook run when the shutdown timer expires
    pub fn set_termination_hook(&mut self, hook: impl FnMut() + 'static) {
        self.terminate = Some(Box::new(hook));
    }

    pub fn is_client_connected(&self) -> bool {
        self.client_connected
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn start_initial_timer(&mut self, delay: Duration) {
        log::warn!(
            "Initial shutdown timer started and will expire in {} seconds",
            delay.as_secs()
        );
        self.deadline = Some(self.clock.now() + delay);
    }

    pub fn client_connected(&mut self) {
        self.client_connected = true;
        self.ever_connected = true;
        self.deadline = None;
    }

    pub fn client_disconnected(&mut self, settings: &dyn SettingsBackend) {
        self.client_connected = false;
        self.start_shutdown_timer(settings);
    }

    /// Re-arms the timer after a `static` or `timeout` change
    pub fn policy_changed(&mut self, settings: &dyn SettingsBackend) {
        if self.ever_connected {
            self.start_shutdown_timer(settings);
        }
    }

    fn start_shutdown_timer(&mut self, settings: &dyn SettingsBackend) {
        self.deadline = None;
        if self.client_connected || self.terminated {
            return;
        }

        if settings.bool_value(keys::STATIC_SERVICE, true) {
            return;
        }

        let deadline = settings
            .int_value(keys::SHUTDOWN_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
            .and_then(|secs| u64::try_from(secs).ok())
            .and_then(|secs| {
                self.clock
                    .now()
                    .checked_add(Duration::from_secs(secs))
                    .map(|deadline| (secs, deadline))
            });
        match deadline {
            Some((secs, deadline)) => {
                self.deadline = Some(deadline);
                log::warn!("Shutdown timer started and will expire in {} seconds", secs);
            }
            None => log::warn!(
                "Conversion failed. Timer will not work properly. Please enter valid timeout value"
            ),
        }
    }

    /// Fires the termination hook once the deadline passed
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                self.terminated = true;
                log::warn!("Shutdown timer expired. Quit");
                if let Some(hook) = self.terminate.as_mut() {
                    hook();
                }
                true
            }
            _ => false,
        }
    }
}
