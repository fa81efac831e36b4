use std::path::PathBuf;

use tracing::warn;

use super::model::Instance;
use crate::core::error::{LauncherError, LauncherResult};

/// Reads and updates instance records on disk.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.instances_dir.join(id).join("instance.json").is_file()
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::Io {
                path: config_path,
                source: e,
            })?;

        Ok(())
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> LauncherResult<Instance> {
        let instance_dir = self.instances_dir.join(id);
        let config_path = instance_dir.join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }

        let json =
            tokio::fs::read_to_string(&config_path)
                .await
                .map_err(|e| LauncherError::Io {
                    path: config_path.clone(),
                    source: e,
                })?;

        let mut instance: Instance = serde_json::from_str(&json)?;
        if instance.id != id {
            warn!(
                "instance.json at {:?} claims id {}, using directory name",
                config_path, instance.id
            );
            instance.id = id.to_string();
        }
        // The record may have been moved together with the data directory.
        instance.path = instance_dir;
        Ok(instance)
    }
}
