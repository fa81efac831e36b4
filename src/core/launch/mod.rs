pub mod controller;
pub mod process;

pub use controller::{LaunchCompletion, LaunchController, LaunchFailureReason, LaunchOutcome, LaunchPlan};
pub use process::{GameProcess, GameSpawner, LaunchRequest, ProcessExit, ProcessSpawner};
