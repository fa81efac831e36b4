// ─── Startup State Machine ───
// StartingUp → Failed | Succeeded | Initialized. All three are terminal for
// the startup phase; Initialized then stays the live state until exit.

use tracing::{error, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::Status;

/// Human-readable reason attached to a `Failed` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub title: String,
    pub message: String,
}

/// Result of the first-run setup flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug)]
pub struct StartupStateMachine {
    status: Status,
    fatal: Option<FatalError>,
}

impl Default for StartupStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupStateMachine {
    pub fn new() -> Self {
        Self {
            status: Status::StartingUp,
            fatal: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn fatal_error(&self) -> Option<&FatalError> {
        self.fatal.as_ref()
    }

    pub fn fail(&mut self, title: impl Into<String>, message: impl Into<String>) -> LauncherResult<()> {
        self.transition(Status::Failed)?;
        let fatal = FatalError {
            title: title.into(),
            message: message.into(),
        };
        error!("Startup failed: {}: {}", fatal.title, fatal.message);
        self.fatal = Some(fatal);
        Ok(())
    }

    /// Headless purpose dispatched; nothing else will be shown.
    pub fn succeed(&mut self) -> LauncherResult<()> {
        self.transition(Status::Succeeded)?;
        info!("Startup finished headless");
        Ok(())
    }

    /// Applies the outcome of the setup flow. `None` means no setup was needed.
    pub fn finish_setup(&mut self, outcome: Option<SetupOutcome>) -> LauncherResult<()> {
        match outcome {
            None | Some(SetupOutcome::Completed) => {
                self.transition(Status::Initialized)?;
                info!("Launcher initialized");
                Ok(())
            }
            Some(SetupOutcome::Cancelled) => self.fail(
                "Setup cancelled",
                "The first-run setup was cancelled, the launcher cannot continue.",
            ),
            Some(SetupOutcome::Failed(reason)) => self.fail("Setup failed", reason),
        }
    }

    fn transition(&mut self, to: Status) -> LauncherResult<()> {
        if self.status != Status::StartingUp {
            return Err(LauncherError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
