//! Driver registry
//!
//! Detection priority is registration order: Maven, then Gradle, then
//! Node. First match wins; a project matching none of the three has no
//! recognized project type and any driver-backed mandatory stage fails.

use super::{GradleDriver, MavenDriver, NodeDriver, ToolDriver};
use crate::fs::FileSystem;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn ToolDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MavenDriver));
        registry.register(Arc::new(GradleDriver));
        registry.register(Arc::new(NodeDriver));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn ToolDriver>) {
        self.drivers.push(driver);
    }

    /// First driver whose descriptor is present in the project tree.
    pub fn detect(&self, fs: &dyn FileSystem, root: &Path) -> Option<&dyn ToolDriver> {
        for driver in &self.drivers {
            if driver.matches(fs, root) {
                debug!(kind = %driver.kind(), "Detected project type");
                return Some(driver.as_ref());
            }
        }
        None
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
