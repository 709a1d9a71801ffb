//! Maven driver (pom.xml)

use super::{DriverAction, ProjectKind, ToolDriver};
use crate::fs::FileSystem;
use std::path::Path;
use tracing::debug;

pub struct MavenDriver;

impl ToolDriver for MavenDriver {
    fn kind(&self) -> ProjectKind {
        ProjectKind::Maven
    }

    fn descriptors(&self) -> &[&'static str] {
        &["pom.xml"]
    }

    fn build_image(&self) -> &'static str {
        "maven:3.9-eclipse-temurin-21"
    }

    fn command(&self, action: DriverAction, skip_tests: bool) -> String {
        match action {
            DriverAction::Build => "mvn -B compile".to_string(),
            DriverAction::Test => "mvn -B test".to_string(),
            DriverAction::SecurityScan => {
                "mvn -B org.owasp:dependency-check-maven:check".to_string()
            }
            DriverAction::Package => {
                if skip_tests {
                    "mvn -B -DskipTests package".to_string()
                } else {
                    "mvn -B package".to_string()
                }
            }
        }
    }

    fn artifact_globs(&self) -> Vec<String> {
        vec!["target/*.jar".to_string(), "target/*.war".to_string()]
    }

    fn project_name(&self, fs: &dyn FileSystem, root: &Path) -> Option<String> {
        let content = fs.read_to_string(&root.join("pom.xml")).ok()?;
        let doc = match roxmltree::Document::parse(&content) {
            Ok(doc) => doc,
            Err(error) => {
                debug!(%error, "pom.xml is not well-formed XML");
                return None;
            }
        };

        // artifactId directly under <project>, not one nested in <parent>
        // or <dependencies>.
        doc.root_element()
            .children()
            .find(|n| n.has_tag_name("artifactId"))
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
    }
}
