// ─── InterfaceOficial Coordinator Core ───
// Single-instance session ownership and lifecycle of launched instances.
//
// Architecture:
//   core/
//     coordinator/: Event loop over invocations, launches, windows and exit
//     ipc/: Single-instance gate over a local socket / named pipe
//     launch/: Launch controller + game process spawning
//     registry: Running instances and their windows
//     startup: StartingUp → Failed | Succeeded | Initialized
//     exit: Exit arbiter
//     state/: Counters, settings and data directory layout
//     instance/: Instance records on disk
//     auth/: Account selection for launches
//     window: UI-layer seam

pub mod auth;
pub mod coordinator;
pub mod error;
pub mod exit;
pub mod import;
pub mod instance;
pub mod intent;
pub mod ipc;
pub mod launch;
pub mod registry;
pub mod startup;
pub mod state;
pub mod window;
