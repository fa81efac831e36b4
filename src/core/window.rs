use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::core::launch::LaunchOutcome;
use crate::core::startup::{FatalError, SetupOutcome};
use crate::core::state::LauncherSettings;

/// Stable handle of a window owned by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Everything the coordinator needs from the UI layer.
///
/// Windows the coordinator closes itself are gone when `close_window`
/// returns. Windows the user closes are reported through
/// `CoordinatorHandle::window_closed`.
#[async_trait]
pub trait WindowHost: Send {
    fn show_main_window(&mut self, minimized: bool) -> WindowId;

    fn create_window_for(&mut self, instance_id: &str) -> WindowId;

    fn focus_window(&mut self, window: WindowId);

    fn close_window(&mut self, window: WindowId);

    fn show_import(&mut self, window: WindowId, archive: &Path);

    fn notify_instance_finished(
        &mut self,
        instance_id: &str,
        window: Option<WindowId>,
        outcome: &LaunchOutcome,
    );

    fn show_fatal_error(&mut self, error: &FatalError);

    /// First-run flow. May edit `settings`; the coordinator persists them.
    async fn run_setup_flow(&mut self, settings: &mut LauncherSettings) -> SetupOutcome;
}

/// Window layer for terminal use: windows are just ids and log lines.
#[derive(Debug, Default)]
pub struct HeadlessWindowHost {
    next_id: u64,
}

impl HeadlessWindowHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> WindowId {
        self.next_id += 1;
        WindowId(self.next_id)
    }
}

#[async_trait]
impl WindowHost for HeadlessWindowHost {
    fn show_main_window(&mut self, minimized: bool) -> WindowId {
        let id = self.allocate();
        info!("Main window {:?} opened (minimized: {}), Ctrl+C closes it", id, minimized);
        id
    }

    fn create_window_for(&mut self, instance_id: &str) -> WindowId {
        let id = self.allocate();
        info!("Console window {:?} opened for instance {}", id, instance_id);
        id
    }

    fn focus_window(&mut self, window: WindowId) {
        info!("Focusing window {:?}", window);
    }

    fn close_window(&mut self, window: WindowId) {
        info!("Window {:?} closed", window);
    }

    fn show_import(&mut self, window: WindowId, archive: &Path) {
        info!("Import of {:?} requested in window {:?}", archive, window);
    }

    fn notify_instance_finished(
        &mut self,
        instance_id: &str,
        _window: Option<WindowId>,
        outcome: &LaunchOutcome,
    ) {
        match outcome {
            LaunchOutcome::Succeeded => info!("Instance {} exited normally", instance_id),
            LaunchOutcome::Failed(reason) => warn!("Instance {} ended: {}", instance_id, reason),
        }
    }

    fn show_fatal_error(&mut self, fatal: &FatalError) {
        error!("{}: {}", fatal.title, fatal.message);
    }

    async fn run_setup_flow(&mut self, settings: &mut LauncherSettings) -> SetupOutcome {
        info!("First run: writing default launcher settings");
        settings.setup_completed = true;
        SetupOutcome::Completed
    }
}
