//! Camera registry.
//!
//! Thread-safe collection of camera handles keyed by identifier. The
//! registry owns connect/disconnect lifecycle; every structural
//! operation (add, remove, lookup, iterate) is serialized by a single
//! registry-wide lock. Monitoring workers hold `SharedCamera` clones and
//! lock individual cameras without touching the registry lock, so no
//! lock-ordering cycle exists.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::camera::{CameraDevice, SharedCamera};

/// Thread-safe camera collection keyed by camera id.
#[derive(Default)]
pub struct CameraRegistry {
    cameras: Mutex<HashMap<String, SharedCamera>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera. Fails when the identifier is already taken;
    /// the existing entry is left untouched.
    pub fn add(&self, camera: SharedCamera) -> Result<()> {
        let id = {
            let guard = camera
                .lock()
                .map_err(|_| anyhow!("camera lock poisoned"))?;
            guard.id().to_string()
        };
        if id.is_empty() {
            return Err(anyhow!("camera id must not be empty"));
        }

        let mut cameras = self.lock()?;
        if cameras.contains_key(&id) {
            return Err(anyhow!("camera with id '{}' already exists", id));
        }
        cameras.insert(id.clone(), camera);
        log::info!("camera '{}' added to registry", id);
        Ok(())
    }

    /// Disconnect and delete a camera. Fails when the id is unknown.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut cameras = self.lock()?;
        let camera = cameras
            .remove(id)
            .ok_or_else(|| anyhow!("camera '{}' not found", id))?;
        if let Ok(mut guard) = camera.lock() {
            if let Err(e) = guard.disconnect() {
                log::warn!("camera '{}' failed to disconnect on removal: {}", id, e);
            }
        }
        log::info!("camera '{}' removed from registry", id);
        Ok(())
    }

    /// Shared handle for a camera, or None when unknown.
    pub fn get(&self, id: &str) -> Option<SharedCamera> {
        self.lock().ok()?.get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Connect every registered camera. Attempts all of them and
    /// returns false when any single connect failed.
    pub fn connect_all(&self) -> bool {
        self.for_each_camera(|id, camera| {
            camera.connect().map_err(|e| {
                log::error!("camera '{}' failed to connect: {}", id, e);
                e
            })
        })
    }

    /// Disconnect every registered camera, reporting aggregate success.
    pub fn disconnect_all(&self) -> bool {
        self.for_each_camera(|id, camera| {
            camera.disconnect().map_err(|e| {
                log::error!("camera '{}' failed to disconnect: {}", id, e);
                e
            })
        })
    }

    fn for_each_camera(
        &self,
        mut op: impl FnMut(&str, &mut dyn CameraDevice) -> Result<()>,
    ) -> bool {
        let Ok(cameras) = self.lock() else {
            return false;
        };
        let mut success = true;
        for (id, camera) in cameras.iter() {
            match camera.lock() {
                Ok(mut guard) => {
                    if op(id, &mut *guard).is_err() {
                        success = false;
                    }
                }
                Err(_) => success = false,
            }
        }
        success
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SharedCamera>>> {
        self.cameras
            .lock()
            .map_err(|_| anyhow!("camera registry lock poisoned"))
    }
}
