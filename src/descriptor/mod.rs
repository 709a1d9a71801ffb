//! Build descriptor detection and tool drivers
//!
//! A tool driver owns the mapping from a recognized build descriptor to the
//! concrete commands the mandatory stages run. Detection tries drivers in a
//! fixed priority order (Maven, then Gradle, then Node); the first whose
//! descriptor is present in the project tree wins.

use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub mod gradle;
pub mod maven;
pub mod node;
pub mod registry;
pub mod targets;

pub use gradle::GradleDriver;
pub use maven::MavenDriver;
pub use node::NodeDriver;
pub use registry::DriverRegistry;
pub use targets::TargetIndex;

/// Recognized project types, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectKind {
    Maven,
    Gradle,
    Node,
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectKind::Maven => f.write_str("maven"),
            ProjectKind::Gradle => f.write_str("gradle"),
            ProjectKind::Node => f.write_str("node"),
        }
    }
}

/// Build-tool operations the mandatory backbone delegates to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    Build,
    Test,
    /// Dependency audit.
    SecurityScan,
    Package,
}

/// A build tool recognized by its descriptor file(s).
pub trait ToolDriver: Send + Sync {
    fn kind(&self) -> ProjectKind;

    /// Descriptor files whose presence selects this driver.
    fn descriptors(&self) -> &[&'static str];

    /// Platform-pinned toolchain image for mandatory container stages.
    fn build_image(&self) -> &'static str;

    /// Shell command for a backbone action. `skip_tests` is forwarded so
    /// packaging commands suppress embedded test execution.
    fn command(&self, action: DriverAction, skip_tests: bool) -> String;

    /// Artifact patterns handed to the archiver collaborator.
    fn artifact_globs(&self) -> Vec<String>;

    /// Whether this driver's descriptor is present in the project tree.
    fn matches(&self, fs: &dyn FileSystem, root: &Path) -> bool {
        self.descriptors()
            .iter()
            .any(|d| fs.is_file(&root.join(d)))
    }

    /// Project name extracted from the descriptor, for display.
    fn project_name(&self, fs: &dyn FileSystem, root: &Path) -> Option<String>;
}
