//! Node driver (package.json)

use super::{DriverAction, ProjectKind, ToolDriver};
use crate::fs::FileSystem;
use std::path::Path;
use tracing::debug;

pub struct NodeDriver;

impl ToolDriver for NodeDriver {
    fn kind(&self) -> ProjectKind {
        ProjectKind::Node
    }

    fn descriptors(&self) -> &[&'static str] {
        &["package.json"]
    }

    fn build_image(&self) -> &'static str {
        "node:20"
    }

    fn command(&self, action: DriverAction, _skip_tests: bool) -> String {
        match action {
            DriverAction::Build => "npm ci && npm run build --if-present".to_string(),
            DriverAction::Test => "npm test".to_string(),
            DriverAction::SecurityScan => "npm audit --audit-level=high".to_string(),
            DriverAction::Package => "npm pack".to_string(),
        }
    }

    fn artifact_globs(&self) -> Vec<String> {
        vec!["*.tgz".to_string(), "dist/".to_string()]
    }

    fn project_name(&self, fs: &dyn FileSystem, root: &Path) -> Option<String> {
        let content = fs.read_to_string(&root.join("package.json")).ok()?;
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(manifest) => manifest
                .get("name")
                .and_then(|n| n.as_str())
                .map(String::from),
            Err(error) => {
                debug!(%error, "package.json is not valid JSON");
                None
            }
        }
    }
}
