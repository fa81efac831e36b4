pub mod app_state;
pub mod settings;

pub use app_state::{ApplicationState, Status};
pub use settings::{LauncherPaths, LauncherSettings, ProfilerConfig};
