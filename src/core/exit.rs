use crate::core::state::{ApplicationState, Status};

/// Decides whether the process has nothing left to do.
pub struct ExitArbiter;

impl ExitArbiter {
    pub fn should_exit_now(state: &ApplicationState) -> bool {
        Self::evaluate(state.open_windows(), state.running_instances(), state.status())
    }

    pub fn evaluate(open_windows: usize, running_instances: usize, status: Status) -> bool {
        open_windows == 0 && running_instances == 0 && status != Status::StartingUp
    }
}
