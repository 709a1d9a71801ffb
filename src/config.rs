//! Pipeline configuration
//!
//! An immutable input bundle for one run, deserialized from a YAML or TOML
//! file (chosen by extension) and validated before any stage executes.

use crate::stage::{Edge, FailurePolicy, GroupPolicy, MandatoryStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CACHE_VOLUME: &str = "gantry-cache";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("repository-url is required and must not be empty")]
    MissingRepositoryUrl,

    #[error("failed to read pipeline config {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported config format for {0:?} (expected .yaml, .yml, or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("execution context override targets mandatory stage '{0}'; mandatory stage images are fixed by the platform")]
    MandatoryContextOverride(String),

    #[error("custom stage '{name}' is anchored at unknown mandatory stage '{anchor}'")]
    UnknownAnchor { name: String, anchor: String },

    #[error("group policy key '{0}' does not name an anchor point (expected e.g. 'after-build')")]
    UnknownGroupKey(String),

    #[error("stage-timeout-secs must be at least 1 when set")]
    ZeroTimeout,
}

/// Caller-supplied stage definition, attached to an anchor point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomStageSpec {
    /// Mandatory stage name this stage attaches to.
    pub anchor: String,

    pub edge: Edge,

    /// Container image to run in. Absent means the host context.
    #[serde(default)]
    pub image: Option<String>,

    /// Inline shell command.
    #[serde(default)]
    pub command: Option<String>,

    /// Script path inside the workspace, run with `sh`.
    #[serde(default)]
    pub script: Option<PathBuf>,

    #[serde(default = "default_custom_policy")]
    pub policy: FailurePolicy,
}

fn default_custom_policy() -> FailurePolicy {
    FailurePolicy::Degrade
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_cache_volume() -> String {
    DEFAULT_CACHE_VOLUME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Source to check out. Checkout itself is an external collaborator;
    /// the url is validated and carried into the run report.
    pub repository_url: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// When true the mandatory Test stage is recorded Skipped and drivers
    /// suppress embedded test execution in packaging commands.
    #[serde(default = "default_true")]
    pub skip_tests: bool,

    /// Activates the cache-purge stage before Build.
    #[serde(default = "default_true")]
    pub clean_cache_before_build: bool,

    /// Named volume mounted into container stages at the fixed cache path.
    #[serde(default = "default_cache_volume")]
    pub cache_volume: String,

    /// Per-stage container image overrides. Hook and custom stages only;
    /// naming a mandatory stage is rejected at validation.
    #[serde(default)]
    pub context_overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub custom_stages: BTreeMap<String, CustomStageSpec>,

    /// Per-anchor sibling-group failure policy, keyed like `after-build`.
    /// Anchors without an entry default to best-effort.
    #[serde(default)]
    pub group_policies: BTreeMap<String, GroupPolicy>,

    /// Hard per-stage timeout. None preserves the unbounded behavior.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Checked-out project tree the run operates on.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
}

impl PipelineConfig {
    /// Minimal valid configuration, used as the base for CLI overrides.
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            branch: default_branch(),
            skip_tests: true,
            clean_cache_before_build: true,
            cache_volume: default_cache_volume(),
            context_overrides: BTreeMap::new(),
            custom_stages: BTreeMap::new(),
            group_policies: BTreeMap::new(),
            stage_timeout_secs: None,
            workspace: default_workspace(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let config: PipelineConfig = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fails before any stage runs: the orchestrator refuses an invalid
    /// configuration outright.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository_url.trim().is_empty() {
            return Err(ConfigError::MissingRepositoryUrl);
        }

        for stage_name in self.context_overrides.keys() {
            if MandatoryStage::from_name(stage_name).is_some() {
                return Err(ConfigError::MandatoryContextOverride(stage_name.clone()));
            }
        }

        for (name, spec) in &self.custom_stages {
            if MandatoryStage::from_name(&spec.anchor).is_none() {
                return Err(ConfigError::UnknownAnchor {
                    name: name.clone(),
                    anchor: spec.anchor.clone(),
                });
            }
        }

        for key in self.group_policies.keys() {
            if !Self::is_anchor_key(key) {
                return Err(ConfigError::UnknownGroupKey(key.clone()));
            }
        }

        if self.stage_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    fn is_anchor_key(key: &str) -> bool {
        let Some((edge, stage)) = key.split_once('-') else {
            return false;
        };
        matches!(edge, "before" | "after") && MandatoryStage::from_name(stage).is_some()
    }

    /// Static config flag lookup for activation predicates.
    pub fn flag_enabled(&self, key: &str) -> bool {
        match key {
            "clean-cache-before-build" => self.clean_cache_before_build,
            "skip-tests" => self.skip_tests,
            _ => false,
        }
    }

    /// Sibling-group failure policy at an anchor; best-effort by default.
    pub fn group_policy(&self, anchor_key: &str) -> GroupPolicy {
        self.group_policies
            .get(anchor_key)
            .copied()
            .unwrap_or_default()
    }

    /// Caller image override for a hook or custom stage, if any.
    pub fn context_override(&self, stage_name: &str) -> Option<&str> {
        self.context_overrides.get(stage_name).map(String::as_str)
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Repository: {}", self.repository_url)?;
        writeln!(f, "  Branch: {}", self.branch)?;
        writeln!(f, "  Skip Tests: {}", self.skip_tests)?;
        writeln!(f, "  Clean Cache: {}", self.clean_cache_before_build)?;
        writeln!(f, "  Cache Volume: {}", self.cache_volume)?;
        writeln!(f, "  Workspace: {}", self.workspace.display())?;
        writeln!(f, "  Custom Stages: {}", self.custom_stages.len())?;
        if let Some(secs) = self.stage_timeout_secs {
            writeln!(f, "  Stage Timeout: {}s", secs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(extension: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{}", extension))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("git@example.com:acme/billing.git");

        assert_eq!(config.branch, "main");
        assert!(config.skip_tests);
        assert!(config.clean_cache_before_build);
        assert_eq!(config.cache_volume, "gantry-cache");
        assert!(config.stage_timeout_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_repository_url_rejected() {
        let config = PipelineConfig::new("   ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRepositoryUrl)
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let file = write_config(
            "yaml",
            r#"
repository-url: "git@example.com:acme/billing.git"
branch: release/2024
skip-tests: false
custom-stages:
  lint:
    anchor: build
    edge: after
    command: "make lint"
    policy: degrade
group-policies:
  after-build: fail-fast
"#,
        );

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.branch, "release/2024");
        assert!(!config.skip_tests);
        assert_eq!(config.custom_stages["lint"].anchor, "build");
        assert_eq!(config.group_policy("after-build"), GroupPolicy::FailFast);
        assert_eq!(config.group_policy("after-test"), GroupPolicy::BestEffort);
    }

    #[test]
    fn test_toml_round_trip() {
        let file = write_config(
            "toml",
            r#"
repository-url = "https://example.com/acme/billing.git"

[custom-stages.smoke]
anchor = "test"
edge = "after"
script = "ci/smoke.sh"
"#,
        );

        let config = PipelineConfig::from_file(file.path()).unwrap();
        let smoke = &config.custom_stages["smoke"];
        assert_eq!(smoke.edge, Edge::After);
        assert_eq!(smoke.policy, FailurePolicy::Degrade);
        assert_eq!(smoke.script.as_deref(), Some(Path::new("ci/smoke.sh")));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_config("json", "{}");
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_mandatory_context_override_rejected() {
        let mut config = PipelineConfig::new("url");
        config
            .context_overrides
            .insert("build".to_string(), "evil/toolchain:latest".to_string());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MandatoryContextOverride(name)) if name == "build"
        ));
    }

    #[test]
    fn test_hook_context_override_allowed() {
        let mut config = PipelineConfig::new("url");
        config
            .context_overrides
            .insert("after-build".to_string(), "node:20".to_string());

        assert!(config.validate().is_ok());
        assert_eq!(config.context_override("after-build"), Some("node:20"));
    }

    #[test]
    fn test_unknown_anchor_rejected() {
        let mut config = PipelineConfig::new("url");
        config.custom_stages.insert(
            "lint".to_string(),
            CustomStageSpec {
                anchor: "deploy".to_string(),
                edge: Edge::After,
                image: None,
                command: Some("make lint".to_string()),
                script: None,
                policy: FailurePolicy::Degrade,
            },
        );

        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownAnchor { .. })
        ));
    }

    #[test]
    fn test_bad_group_key_rejected() {
        let mut config = PipelineConfig::new("url");
        config
            .group_policies
            .insert("during-build".to_string(), GroupPolicy::FailFast);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownGroupKey(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = PipelineConfig::new("url");
        config.stage_timeout_secs = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_flag_lookup() {
        let mut config = PipelineConfig::new("url");
        config.clean_cache_before_build = false;

        assert!(!config.flag_enabled("clean-cache-before-build"));
        assert!(config.flag_enabled("skip-tests"));
        assert!(!config.flag_enabled("no-such-flag"));
    }
}
