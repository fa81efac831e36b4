use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Instance record persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<id>/` with:
/// - `minecraft/`: game working directory
/// - `instance.json`: this serialized struct
///
/// `launch_command` is produced by the install pipeline: the program followed
/// by its arguments, ready to spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
    pub launch_command: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_played: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(name: String, launch_command: Vec<String>, base_dir: &std::path::Path) -> Self {
        let id = Uuid::new_v4().to_string();
        let path = base_dir.join(&id);

        Self {
            id,
            name,
            path,
            launch_command,
            created_at: Utc::now(),
            last_played: None,
        }
    }

    /// Path to the instance's `minecraft/` game working directory.
    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    /// Path to this instance's config file.
    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }
}
