//! Orchestrator
//!
//! Runs a composed plan: backbone stages strictly sequentially, custom
//! sibling groups concurrently with a join before the backbone proceeds.
//! Terminal states are mutually exclusive; Failed is the only aborting
//! one. Finalization always executes.

use super::{Plan, PlanEntry, Planner, RunContext, StageRunner};
use crate::stage::backbone;
use crate::stage::{
    Anchor, CustomStageRegistry, GroupPolicy, PipelineStatus, RunResult, StageDef, StageKind,
    StageStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Final pipeline outcome plus the per-stage log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub repository: String,
    pub branch: String,
    pub status: PipelineStatus,
    /// Names the governing policy that produced the outcome.
    pub reason: String,
    pub stages: Vec<RunResult>,
    pub finalization: Option<RunResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PipelineReport {
    /// Stages that actually ran (everything not recorded Skipped).
    pub fn executed_stages(&self) -> usize {
        self.stages.iter().filter(|r| r.executed()).count()
    }

    pub fn stage(&self, name: &str) -> Option<&RunResult> {
        self.stages.iter().find(|r| r.stage == name)
    }
}

/// Accumulates the pipeline status under the aggregation law
/// Failed > Degraded > Succeeded, remembering the first event that
/// decided each level.
struct Aggregate {
    status: PipelineStatus,
    fail_reason: Option<String>,
    degrade_reason: Option<String>,
}

impl Aggregate {
    fn new() -> Self {
        Self {
            status: PipelineStatus::Succeeded,
            fail_reason: None,
            degrade_reason: None,
        }
    }

    /// Fold one stage result in. Returns true if the backbone must halt.
    fn absorb(&mut self, result: &RunResult) -> bool {
        match result.status {
            StageStatus::Failed => {
                self.status = self.status.combine(PipelineStatus::Failed);
                if self.fail_reason.is_none() {
                    self.fail_reason = Some(match result.kind {
                        StageKind::Mandatory if result.exit_code.is_some() => {
                            format!("mandatory stage '{}' returned nonzero", result.stage)
                        }
                        StageKind::Mandatory => {
                            format!("mandatory stage '{}' failed", result.stage)
                        }
                        kind => {
                            format!("{} stage '{}' failed under abort policy", kind, result.stage)
                        }
                    });
                }
                true
            }
            StageStatus::Degraded => {
                self.status = self.status.combine(PipelineStatus::Degraded);
                if self.degrade_reason.is_none() {
                    self.degrade_reason = Some(format!(
                        "{} stage '{}' failed under degrade policy",
                        result.kind, result.stage
                    ));
                }
                false
            }
            StageStatus::Success | StageStatus::Skipped => false,
        }
    }

    fn fail(&mut self, reason: String) {
        self.status = self.status.combine(PipelineStatus::Failed);
        if self.fail_reason.is_none() {
            self.fail_reason = Some(reason);
        }
    }

    fn reason(&self) -> String {
        match self.status {
            PipelineStatus::Failed => self
                .fail_reason
                .clone()
                .unwrap_or_else(|| "pipeline failed".to_string()),
            PipelineStatus::Degraded => self
                .degrade_reason
                .clone()
                .unwrap_or_else(|| "pipeline degraded".to_string()),
            PipelineStatus::Succeeded => "all stages completed successfully".to_string(),
        }
    }
}

pub struct Orchestrator {
    ctx: RunContext,
    custom: CustomStageRegistry,
}

impl Orchestrator {
    pub fn new(ctx: RunContext) -> Self {
        let custom = CustomStageRegistry::from_config(&ctx.config);
        Self { ctx, custom }
    }

    /// Compose the stage plan without executing it.
    pub fn plan(&self) -> Plan {
        Planner::compose(&self.ctx, &self.custom)
    }

    pub async fn run(&self) -> PipelineReport {
        let plan = self.plan();
        self.run_plan(plan).await
    }

    pub async fn run_plan(&self, plan: Plan) -> PipelineReport {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            run_id = %self.ctx.run_id,
            repository = %self.ctx.config.repository_url,
            branch = %self.ctx.config.branch,
            "Pipeline starting"
        );

        let runner = Arc::new(StageRunner::new(&self.ctx));
        let mut aggregate = Aggregate::new();
        let mut results: Vec<RunResult> = Vec::new();

        for entry in &plan.entries {
            if self.ctx.aborted() {
                aggregate.fail("run externally aborted".to_string());
                break;
            }

            let halt = match entry {
                PlanEntry::Stage(def) => {
                    let result = runner.execute(def).await;
                    let halt = aggregate.absorb(&result);
                    results.push(result);
                    halt
                }
                PlanEntry::Group {
                    anchor,
                    policy,
                    stages,
                } => {
                    self.run_group(&runner, anchor, *policy, stages, &mut aggregate, &mut results)
                        .await
                }
            };

            if halt {
                break;
            }
        }

        // The "always" step: cleanup runs regardless of terminal state,
        // and its own failure never changes the decided outcome.
        let finalize = backbone::finalize_def();
        let finalization = runner.execute(&finalize).await;
        if finalization.status != StageStatus::Success {
            warn!(stage = %finalize.name, "Finalization failed; terminal state unchanged");
        }

        let status = aggregate.status;
        let reason = aggregate.reason();
        match status {
            PipelineStatus::Succeeded => info!(status = %status, %reason, "Pipeline finished"),
            PipelineStatus::Degraded => warn!(status = %status, %reason, "Pipeline finished"),
            PipelineStatus::Failed => error!(status = %status, %reason, "Pipeline finished"),
        }

        PipelineReport {
            run_id: self.ctx.run_id.to_string(),
            repository: self.ctx.config.repository_url.clone(),
            branch: self.ctx.config.branch.clone(),
            status,
            reason,
            stages: results,
            finalization: Some(finalization),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Run one anchor group concurrently and join before the backbone
    /// proceeds. Returns true if the group decision halts the backbone.
    async fn run_group(
        &self,
        runner: &Arc<StageRunner>,
        anchor: &Anchor,
        policy: GroupPolicy,
        stages: &[StageDef],
        aggregate: &mut Aggregate,
        results: &mut Vec<RunResult>,
    ) -> bool {
        info!(
            anchor = %anchor,
            siblings = stages.len(),
            policy = ?policy,
            "Custom stage group starting"
        );

        let mut set: JoinSet<RunResult> = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, String> = HashMap::new();

        for def in stages {
            let runner = Arc::clone(runner);
            let def = def.clone();
            let name = def.name.clone();
            let handle = set.spawn(async move { runner.execute(&def).await });
            pending.insert(handle.id(), name);
        }

        let group_start = results.len();
        let mut first_failure: Option<String> = None;

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);

                    let body_failed = matches!(
                        result.status,
                        StageStatus::Failed | StageStatus::Degraded
                    );
                    if body_failed && first_failure.is_none() {
                        first_failure = Some(result.stage.clone());
                        if policy == GroupPolicy::FailFast {
                            // Cancel the siblings; their results are
                            // recorded Skipped below, never Success.
                            set.abort_all();
                        }
                    }

                    results.push(result);
                }
                Err(join_error) => {
                    let name = pending
                        .remove(&join_error.id())
                        .unwrap_or_else(|| "unknown".to_string());

                    if join_error.is_cancelled() {
                        results.push(RunResult {
                            stage: name,
                            kind: StageKind::Custom,
                            status: StageStatus::Skipped,
                            exit_code: None,
                            output: "cancelled: sibling failed under fail-fast group policy"
                                .to_string(),
                            started_at: Utc::now(),
                            duration_ms: 0,
                        });
                    } else {
                        error!(stage = %name, %join_error, "Stage task panicked");
                        if first_failure.is_none() {
                            first_failure = Some(name.clone());
                            if policy == GroupPolicy::FailFast {
                                set.abort_all();
                            }
                        }
                        results.push(RunResult {
                            stage: name,
                            kind: StageKind::Custom,
                            status: StageStatus::Failed,
                            exit_code: None,
                            output: join_error.to_string(),
                            started_at: Utc::now(),
                            duration_ms: 0,
                        });
                    }
                }
            }
        }

        match policy {
            GroupPolicy::FailFast => {
                if let Some(stage) = first_failure {
                    aggregate.fail(format!(
                        "custom stage '{}' failed under fail-fast group policy at {}",
                        stage, anchor
                    ));
                    true
                } else {
                    false
                }
            }
            GroupPolicy::BestEffort => {
                let mut halt = false;
                let group_results: Vec<RunResult> = results[group_start..].to_vec();
                for result in &group_results {
                    halt |= aggregate.absorb(result);
                }
                halt
            }
        }
    }
}
