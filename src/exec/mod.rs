//! Execution Context Provider
//!
//! A stage body runs either in the orchestrator's own process ([`HostExecutor`])
//! or inside a freshly started container bound to the persistent dependency
//! cache volume ([`ContainerExecutor`]). Containers are torn down on every
//! exit path, success or failure.

mod container;
mod host;
mod mock;

pub use container::ContainerExecutor;
pub use host::HostExecutor;
pub use mock::{MockExecutor, MockExecutorFactory};

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Fixed mount point of the dependency cache volume inside containers.
pub const CACHE_MOUNT: &str = "/var/cache/gantry";

/// Fixed mount point of the project workspace inside containers.
pub const WORKSPACE_MOUNT: &str = "/workspace";

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("container backend unavailable; cannot run image '{0}'")]
    BackendUnavailable(String),
}

/// A command to run in some execution context.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub workdir: PathBuf,
}

/// Exit status and captured output of one command execution.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub exit_code: i64,
    pub output: String,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome>;

    /// Short context label for stage logs, e.g. `host` or `container(node:20)`.
    fn describe(&self) -> String;
}

/// Supplies executors for the contexts a plan requires. Swapped for a mock
/// in tests so orchestration is exercised without processes or a daemon.
pub trait ExecutorFactory: Send + Sync {
    fn host(&self) -> Arc<dyn Executor>;

    fn container(&self, image: &str) -> Result<Arc<dyn Executor>, ExecError>;
}

/// Production factory: host commands via `sh`, containers via the Docker
/// daemon when it was reachable at probe time.
pub struct DefaultExecutorFactory {
    cache_volume: String,
    docker: Option<bollard::Docker>,
}

impl DefaultExecutorFactory {
    pub fn new(cache_volume: String, docker_available: bool) -> Self {
        let docker = if docker_available {
            bollard::Docker::connect_with_local_defaults().ok()
        } else {
            None
        };

        Self {
            cache_volume,
            docker,
        }
    }
}

impl ExecutorFactory for DefaultExecutorFactory {
    fn host(&self) -> Arc<dyn Executor> {
        Arc::new(HostExecutor::new())
    }

    fn container(&self, image: &str) -> Result<Arc<dyn Executor>, ExecError> {
        match &self.docker {
            Some(docker) => Ok(Arc::new(ContainerExecutor::new(
                docker.clone(),
                image.to_string(),
                self.cache_volume.clone(),
            ))),
            None => Err(ExecError::BackendUnavailable(image.to_string())),
        }
    }
}
