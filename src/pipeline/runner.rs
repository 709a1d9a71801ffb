//! Single-stage execution
//!
//! Executes one resolved stage in its required context and maps the
//! outcome through the stage's failure policy. Every stage emits a
//! labeled start and outcome log line.

use crate::config::PipelineConfig;
use crate::descriptor::DriverRegistry;
use crate::exec::{CommandSpec, ExecError, ExecutorFactory};
use crate::fs::FileSystem;
use crate::stage::{
    ExecContext, FailurePolicy, MandatoryStage, RunResult, StageBody, StageDef, StageKind,
    StageStatus,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::RunContext;

const NO_PROJECT_TYPE: &str =
    "no recognized project type (expected pom.xml, build.gradle, or package.json)";

pub struct StageRunner {
    config: Arc<PipelineConfig>,
    fs: Arc<dyn FileSystem>,
    drivers: Arc<DriverRegistry>,
    executors: Arc<dyn ExecutorFactory>,
    timeout: Option<Duration>,
    container_warned: AtomicBool,
}

impl StageRunner {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            config: ctx.config.clone(),
            fs: ctx.fs.clone(),
            drivers: ctx.drivers.clone(),
            executors: ctx.executors.clone(),
            timeout: ctx.config.stage_timeout_secs.map(Duration::from_secs),
            container_warned: AtomicBool::new(false),
        }
    }

    pub async fn execute(&self, def: &StageDef) -> RunResult {
        let started_at = Utc::now();
        let start = Instant::now();
        info!(stage = %def.name, kind = %def.kind, "Stage starting");

        let (status, exit_code, output) = self.execute_inner(def).await;

        let result = RunResult {
            stage: def.name.clone(),
            kind: def.kind,
            status,
            exit_code,
            output,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match result.status {
            StageStatus::Success => {
                info!(stage = %def.name, duration_ms = result.duration_ms, "Stage succeeded")
            }
            StageStatus::Skipped => info!(stage = %def.name, "Stage skipped"),
            StageStatus::Degraded => {
                warn!(stage = %def.name, exit = ?result.exit_code, "Stage failed under degrade policy")
            }
            StageStatus::Failed => {
                error!(stage = %def.name, exit = ?result.exit_code, "Stage failed")
            }
        }

        result
    }

    async fn execute_inner(&self, def: &StageDef) -> (StageStatus, Option<i64>, String) {
        if def.kind == StageKind::Mandatory
            && def.name == MandatoryStage::Test.name()
            && self.config.skip_tests
        {
            return (StageStatus::Skipped, None, "skip-tests enabled".to_string());
        }

        let workspace = self.config.workspace.clone();
        let driver = self.drivers.detect(&*self.fs, &workspace);

        let command = match &def.body {
            StageBody::Driver(action) => match driver {
                Some(driver) => driver.command(*action, self.config.skip_tests),
                None => {
                    return (
                        self.failure_status(def.policy),
                        None,
                        NO_PROJECT_TYPE.to_string(),
                    )
                }
            },
            StageBody::Archive => {
                return match driver {
                    Some(driver) => {
                        let globs = driver.artifact_globs().join(", ");
                        info!(stage = %def.name, artifacts = %globs, "Delegating to artifact archiver");
                        (
                            StageStatus::Success,
                            None,
                            format!("archived artifact patterns: {}", globs),
                        )
                    }
                    None => (
                        self.failure_status(def.policy),
                        None,
                        NO_PROJECT_TYPE.to_string(),
                    ),
                };
            }
            StageBody::Command(command) => command.clone(),
            StageBody::Script(path) => format!("sh {}", path.display()),
            StageBody::Empty => {
                return (StageStatus::Skipped, None, "no executable body".to_string())
            }
        };

        let executor = match &def.context {
            ExecContext::Host => self.executors.host(),
            ExecContext::ToolContainer => {
                let Some(driver) = driver else {
                    return (
                        self.failure_status(def.policy),
                        None,
                        NO_PROJECT_TYPE.to_string(),
                    );
                };
                match self.executors.container(driver.build_image()) {
                    Ok(executor) => executor,
                    Err(err) => return self.backend_unavailable(def, err),
                }
            }
            ExecContext::Image(image) => match self.executors.container(image) {
                Ok(executor) => executor,
                Err(err) => return self.backend_unavailable(def, err),
            },
        };

        let spec = CommandSpec {
            command,
            workdir: workspace,
        };
        debug!(
            stage = %def.name,
            context = %executor.describe(),
            command = %spec.command,
            "Executing stage body"
        );

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, executor.run(&spec)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return (
                        self.failure_status(def.policy),
                        None,
                        format!("stage timed out after {}s", limit.as_secs()),
                    )
                }
            },
            None => executor.run(&spec).await,
        };

        match outcome {
            Ok(outcome) if outcome.succeeded() => (StageStatus::Success, Some(0), outcome.output),
            Ok(outcome) => (
                self.failure_status(def.policy),
                Some(outcome.exit_code),
                outcome.output,
            ),
            Err(error) => (
                self.failure_status(def.policy),
                None,
                format!("{:#}", error),
            ),
        }
    }

    /// Missing isolation backend: abort-class for mandatory stages, a
    /// consolidated warning and skip for hook/custom stages.
    fn backend_unavailable(
        &self,
        def: &StageDef,
        err: ExecError,
    ) -> (StageStatus, Option<i64>, String) {
        if def.kind == StageKind::Mandatory {
            return (StageStatus::Failed, None, err.to_string());
        }

        if !self.container_warned.swap(true, Ordering::Relaxed) {
            warn!("Container backend unavailable; container-bound hook and custom stages will be skipped");
        }
        (StageStatus::Skipped, None, err.to_string())
    }

    fn failure_status(&self, policy: FailurePolicy) -> StageStatus {
        match policy {
            FailurePolicy::Abort => StageStatus::Failed,
            FailurePolicy::Degrade => StageStatus::Degraded,
        }
    }
}
