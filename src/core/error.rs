use std::path::PathBuf;
use thiserror::Error;

/// Why a launch request was refused before any controller was created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchRejection {
    #[error("instance {0} is already running")]
    AlreadyRunning(String),

    #[error("launcher is not initialized")]
    NotInitialized,

    #[error("instance {0} does not exist")]
    UnknownInstance(String),
}

/// Central error type for the coordinator.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Startup ─────────────────────────────────────────
    #[error("{title}: {message}")]
    StartupFailure { title: String, message: String },

    #[error("Invalid startup transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::core::state::Status,
        to: crate::core::state::Status,
    },

    // ── Launch ──────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Account resolution failed: {0}")]
    AccountResolution(String),

    #[error("Process spawn failed: {0}")]
    Spawn(String),

    // ── IPC ─────────────────────────────────────────────
    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Unsupported IPC protocol version {0}")]
    UnsupportedProtocol(u32),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    pub fn startup(title: impl Into<String>, message: impl Into<String>) -> Self {
        LauncherError::StartupFailure {
            title: title.into(),
            message: message.into(),
        }
    }
}
