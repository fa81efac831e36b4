use chrono::{DateTime, Utc};

use crate::core::startup::StartupStateMachine;

/// Lifecycle status of the launcher process itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    StartingUp,
    Failed,
    Succeeded,
    Initialized,
}

/// Process-wide counters owned by the coordinator.
///
/// All mutation happens on the coordinator task, so nothing here is
/// synchronized. The status is only changed through the startup machine.
#[derive(Debug)]
pub struct ApplicationState {
    startup: StartupStateMachine,
    started_at: DateTime<Utc>,
    open_windows: usize,
    running_instances: usize,
    update_running: bool,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationState {
    pub fn new() -> Self {
        Self {
            startup: StartupStateMachine::new(),
            started_at: Utc::now(),
            open_windows: 0,
            running_instances: 0,
            update_running: false,
        }
    }

    pub fn status(&self) -> Status {
        self.startup.status()
    }

    pub fn startup(&self) -> &StartupStateMachine {
        &self.startup
    }

    pub(crate) fn startup_mut(&mut self) -> &mut StartupStateMachine {
        &mut self.startup
    }

    pub fn open_windows(&self) -> usize {
        self.open_windows
    }

    pub fn running_instances(&self) -> usize {
        self.running_instances
    }

    pub fn update_running(&self) -> bool {
        self.update_running
    }

    /// Milliseconds elapsed since the state was constructed.
    pub fn time_since_start(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    pub fn window_opened(&mut self) {
        self.open_windows += 1;
    }

    pub fn window_closed(&mut self) {
        self.open_windows = self.open_windows.saturating_sub(1);
    }

    /// Returns true when this was the first running instance.
    pub fn add_running_instance(&mut self) -> bool {
        self.running_instances += 1;
        self.running_instances == 1
    }

    /// Returns true when the last running instance went away.
    pub fn sub_running_instance(&mut self) -> bool {
        if self.running_instances == 0 {
            return false;
        }
        self.running_instances -= 1;
        self.running_instances == 0
    }

    pub fn set_update_running(&mut self, running: bool) {
        self.update_running = running;
    }

    pub fn updates_are_allowed(&self) -> bool {
        self.running_instances == 0 && !self.update_running
    }
}
