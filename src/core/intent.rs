use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::LauncherError;

pub const DEFAULT_SERVER_PORT: u16 = 25565;

/// What a process start (or a forwarded message) asks the launcher to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationIntent {
    pub instance_id: Option<String>,
    pub server_to_join: Option<ServerTarget>,
    pub profile_to_use: Option<String>,
    pub live_check: bool,
    pub import_archive_path: Option<PathBuf>,
}

impl InvocationIntent {
    pub fn launch(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Default::default()
        }
    }
}

/// A multiplayer server to join once the game is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub address: String,
    pub port: u16,
}

impl FromStr for ServerTarget {
    type Err = LauncherError;

    /// Accepts `host` or `host:port`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (address, port) = match raw.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| LauncherError::Other(format!("Invalid server port in '{raw}'")))?;
                (host, port)
            }
            None => (raw, DEFAULT_SERVER_PORT),
        };

        if address.is_empty() {
            return Err(LauncherError::Other(format!(
                "Missing server address in '{raw}'"
            )));
        }

        Ok(Self {
            address: address.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
