//! Stage model
//!
//! A stage is the unit of pipeline work: a name, a body, an execution
//! context requirement, and a failure policy. Mandatory stages form the
//! platform-controlled backbone; hook stages are derived from the project's
//! hook descriptor; custom stages are registered by the caller against
//! anchor points.

pub mod backbone;
pub mod registry;

pub use registry::{CustomStageDef, CustomStageRegistry};

use crate::descriptor::DriverAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The fixed mandatory backbone, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MandatoryStage {
    Setup,
    Build,
    Test,
    SecurityScan,
    Package,
    Archive,
}

impl MandatoryStage {
    pub const ALL: [MandatoryStage; 6] = [
        MandatoryStage::Setup,
        MandatoryStage::Build,
        MandatoryStage::Test,
        MandatoryStage::SecurityScan,
        MandatoryStage::Package,
        MandatoryStage::Archive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MandatoryStage::Setup => "setup",
            MandatoryStage::Build => "build",
            MandatoryStage::Test => "test",
            MandatoryStage::SecurityScan => "security-scan",
            MandatoryStage::Package => "package",
            MandatoryStage::Archive => "archive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }
}

impl fmt::Display for MandatoryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of a mandatory stage a hook or custom stage attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Edge {
    Before,
    After,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Before => f.write_str("before"),
            Edge::After => f.write_str("after"),
        }
    }
}

/// A (mandatory stage, edge) attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub stage: MandatoryStage,
    pub edge: Edge,
}

impl Anchor {
    pub fn new(stage: MandatoryStage, edge: Edge) -> Self {
        Self { stage, edge }
    }

    /// Key form used in configuration maps and hook target names,
    /// e.g. `after-build`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.edge, self.stage)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.edge, self.stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Mandatory,
    Hook,
    Custom,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Mandatory => f.write_str("mandatory"),
            StageKind::Hook => f.write_str("hook"),
            StageKind::Custom => f.write_str("custom"),
        }
    }
}

/// Failure handling for a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Failure halts the backbone and fails the pipeline.
    Abort,
    /// Failure downgrades the run to Degraded; the backbone continues.
    Degrade,
}

/// Failure handling for a group of custom stages sharing one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupPolicy {
    /// First member failure cancels the siblings; the group is Failed.
    FailFast,
    /// Members run to completion; each failure is handled per-stage.
    #[default]
    BestEffort,
}

/// Execution context requirement for a stage body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecContext {
    /// Run in the orchestrator's own process and filesystem.
    Host,
    /// Run in a container whose image is selected by the platform from the
    /// detected build tool. Not overridable by pipeline configuration.
    ToolContainer,
    /// Run in a container from a caller-selected image (hook/custom only).
    Image(String),
}

impl fmt::Display for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecContext::Host => f.write_str("host"),
            ExecContext::ToolContainer => f.write_str("container(toolchain)"),
            ExecContext::Image(image) => write!(f, "container({})", image),
        }
    }
}

/// The executable body of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageBody {
    /// Build-tool command keyed by the detected project type.
    Driver(DriverAction),
    /// Delegate to the artifact archiver collaborator.
    Archive,
    /// Literal shell command.
    Command(String),
    /// Script path inside the workspace, run with `sh`.
    Script(PathBuf),
    /// No executable body was supplied; the stage is a warned no-op.
    Empty,
}

/// A fully resolved stage, ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct StageDef {
    pub name: String,
    pub kind: StageKind,
    pub body: StageBody,
    pub context: ExecContext,
    pub policy: FailurePolicy,
}

/// Outcome of a single stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Success,
    Failed,
    Degraded,
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Success => f.write_str("success"),
            StageStatus::Failed => f.write_str("failed"),
            StageStatus::Degraded => f.write_str("degraded"),
            StageStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Per-stage record accumulated into the pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stage: String,
    pub kind: StageKind,
    pub status: StageStatus,
    pub exit_code: Option<i64>,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn executed(&self) -> bool {
        self.status != StageStatus::Skipped
    }
}

/// Terminal pipeline status. Total order: Failed > Degraded > Succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    Succeeded,
    Degraded,
    Failed,
}

impl PipelineStatus {
    fn severity(&self) -> u8 {
        match self {
            PipelineStatus::Succeeded => 0,
            PipelineStatus::Degraded => 1,
            PipelineStatus::Failed => 2,
        }
    }

    /// Aggregation law: the worse status wins.
    pub fn combine(self, other: PipelineStatus) -> PipelineStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineStatus::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Succeeded => f.write_str("Succeeded"),
            PipelineStatus::Degraded => f.write_str("Degraded"),
            PipelineStatus::Failed => f.write_str("Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backbone_order() {
        let names: Vec<&str> = MandatoryStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["setup", "build", "test", "security-scan", "package", "archive"]
        );
    }

    #[test]
    fn test_from_name_round_trip() {
        for stage in MandatoryStage::ALL {
            assert_eq!(MandatoryStage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(MandatoryStage::from_name("deploy"), None);
    }

    #[test]
    fn test_anchor_key() {
        let anchor = Anchor::new(MandatoryStage::Build, Edge::After);
        assert_eq!(anchor.key(), "after-build");

        let anchor = Anchor::new(MandatoryStage::SecurityScan, Edge::Before);
        assert_eq!(anchor.key(), "before-security-scan");
    }

    #[test]
    fn test_status_total_order() {
        use PipelineStatus::*;

        assert_eq!(Succeeded.combine(Degraded), Degraded);
        assert_eq!(Degraded.combine(Succeeded), Degraded);
        assert_eq!(Degraded.combine(Failed), Failed);
        assert_eq!(Failed.combine(Degraded), Failed);
        assert_eq!(Failed.combine(Succeeded), Failed);
        assert_eq!(Succeeded.combine(Succeeded), Succeeded);
    }

    #[test]
    fn test_group_policy_default_is_best_effort() {
        assert_eq!(GroupPolicy::default(), GroupPolicy::BestEffort);
    }
}
