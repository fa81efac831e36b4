// ─── Single-instance IPC ───
// One local channel per data directory. The process that claims it is the
// primary; later launches forward their intent over it and exit.

pub mod gate;
pub mod message;
pub mod transport;

pub use gate::{GateOutcome, ServingGate, SingleInstanceGate};
pub use message::{Reply, PROTOCOL_VERSION};
