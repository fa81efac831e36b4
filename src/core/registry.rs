use std::collections::HashMap;

use uuid::Uuid;

use crate::core::launch::LaunchController;
use crate::core::window::WindowId;

/// One running instance: its controller and, if shown, its window.
#[derive(Debug)]
pub struct RunningInstanceEntry {
    pub controller: LaunchController,
    pub window: Option<WindowId>,
}

/// Which instances are running right now. Owns every controller.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: HashMap<String, RunningInstanceEntry>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_running(&self, instance_id: &str) -> bool {
        self.entries.contains_key(instance_id)
    }

    pub fn get(&self, instance_id: &str) -> Option<&RunningInstanceEntry> {
        self.entries.get(instance_id)
    }

    /// Refuses to replace an existing entry; hands the controller back instead.
    pub fn insert(
        &mut self,
        controller: LaunchController,
        window: Option<WindowId>,
    ) -> Result<(), LaunchController> {
        let instance_id = controller.instance_id().to_string();
        if self.entries.contains_key(&instance_id) {
            return Err(controller);
        }
        self.entries
            .insert(instance_id, RunningInstanceEntry { controller, window });
        Ok(())
    }

    /// Removes the entry only if it still belongs to the controller `token`.
    pub fn remove_completed(&mut self, instance_id: &str, token: Uuid) -> Option<RunningInstanceEntry> {
        match self.entries.get(instance_id) {
            Some(entry) if entry.controller.token() == token => self.entries.remove(instance_id),
            _ => None,
        }
    }

    /// Returns whether an active entry was found.
    pub fn request_kill(&self, instance_id: &str) -> bool {
        match self.entries.get(instance_id) {
            Some(entry) => {
                entry.controller.request_kill();
                true
            }
            None => false,
        }
    }

    /// Forgets a closed window. Returns the instance it belonged to.
    pub fn detach_window(&mut self, window: WindowId) -> Option<String> {
        self.entries.iter_mut().find_map(|(instance_id, entry)| {
            if entry.window == Some(window) {
                entry.window = None;
                Some(instance_id.clone())
            } else {
                None
            }
        })
    }
}
