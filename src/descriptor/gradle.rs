//! Gradle driver (build.gradle / settings.gradle, Kotlin DSL included)

use super::{DriverAction, ProjectKind, ToolDriver};
use crate::fs::FileSystem;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn root_project_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"rootProject\.name\s*=\s*['"]([^'"]+)['"]"#).unwrap())
}

pub struct GradleDriver;

impl ToolDriver for GradleDriver {
    fn kind(&self) -> ProjectKind {
        ProjectKind::Gradle
    }

    fn descriptors(&self) -> &[&'static str] {
        &[
            "build.gradle",
            "build.gradle.kts",
            "settings.gradle",
            "settings.gradle.kts",
        ]
    }

    fn build_image(&self) -> &'static str {
        "gradle:8.5-jdk21"
    }

    fn command(&self, action: DriverAction, skip_tests: bool) -> String {
        match action {
            DriverAction::Build => "gradle --console=plain classes".to_string(),
            DriverAction::Test => "gradle --console=plain test".to_string(),
            DriverAction::SecurityScan => {
                "gradle --console=plain dependencyCheckAnalyze".to_string()
            }
            DriverAction::Package => {
                if skip_tests {
                    "gradle --console=plain assemble -x test".to_string()
                } else {
                    "gradle --console=plain build".to_string()
                }
            }
        }
    }

    fn artifact_globs(&self) -> Vec<String> {
        vec!["build/libs/*.jar".to_string()]
    }

    fn project_name(&self, fs: &dyn FileSystem, root: &Path) -> Option<String> {
        for settings in ["settings.gradle", "settings.gradle.kts"] {
            if let Ok(content) = fs.read_to_string(&root.join(settings)) {
                if let Some(captures) = root_project_name().captures(&content) {
                    return Some(captures[1].to_string());
                }
            }
        }
        None
    }
}
