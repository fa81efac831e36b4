use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "InterfaceOficial";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";
const ACCOUNTS_FILE: &str = "accounts.json";
const LIVE_CHECK_FILE: &str = "live.check";
const SOCKET_FILE: &str = "launcher.sock";

/// A named profiler: extra JVM arguments placed in front of the game command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    #[serde(default)]
    pub jvm_args: Vec<String>,
}

/// Read-mostly launcher configuration persisted as `launcher_settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Profile name of the account used when a launch names none.
    pub default_account: Option<String>,
    pub default_profiler: Option<String>,
    pub profilers: BTreeMap<String, ProfilerConfig>,
    /// Open a dedicated window for every launched instance.
    pub show_instance_window: bool,
    pub setup_completed: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            default_account: None,
            default_profiler: None,
            profilers: BTreeMap::new(),
            show_instance_window: true,
            setup_completed: false,
        }
    }
}

impl LauncherSettings {
    /// Missing file means defaults; an unreadable or corrupt one is fatal.
    pub fn load(data_dir: &Path) -> LauncherResult<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| {
            LauncherError::startup(
                "Settings unreadable",
                format!("Cannot read {}: {source}", path.display()),
            )
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            LauncherError::startup(
                "Settings corrupt",
                format!("{} is not valid launcher settings: {e}", path.display()),
            )
        })
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }

    pub fn first_run_required(&self) -> bool {
        !self.setup_completed
    }

    /// Explicit profiler name wins over the configured default.
    pub fn resolve_profiler(&self, requested: Option<&str>) -> Option<(String, ProfilerConfig)> {
        let name = requested.or(self.default_profiler.as_deref())?;
        match self.profilers.get(name) {
            Some(config) => Some((name.to_string(), config.clone())),
            None => {
                tracing::warn!("Profiler '{}' is not configured, launching without it", name);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Filesystem layout rooted at the launcher data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    data_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `--dir` override, then the bootstrap file, then the platform default.
    pub fn resolve(override_dir: Option<PathBuf>) -> LauncherResult<Self> {
        let data_dir = match override_dir {
            Some(dir) => dir,
            None => default_data_dir(),
        };

        std::fs::create_dir_all(&data_dir).map_err(|source| {
            LauncherError::startup(
                "Data directory unavailable",
                format!("Cannot create {}: {source}", data_dir.display()),
            )
        })?;

        Ok(Self::new(data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_FILE)
    }

    pub fn live_check_path(&self) -> PathBuf {
        self.data_dir.join(LIVE_CHECK_FILE)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join(SOCKET_FILE)
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
        tracing::warn!("Ignoring malformed bootstrap file {:?}", bootstrap_path);
    }

    base.join(APP_DIR_NAME)
}
