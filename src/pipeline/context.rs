//! Per-run context
//!
//! Capability detection results and other run-scoped state live here
//! rather than in process-wide variables, so multiple pipelines can run
//! concurrently in one process.

use crate::capability::Capabilities;
use crate::config::PipelineConfig;
use crate::descriptor::DriverRegistry;
use crate::exec::{DefaultExecutorFactory, ExecutorFactory};
use crate::fs::{FileSystem, RealFileSystem};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Flips a run into the aborted state from outside the orchestrator. The
/// run terminates Failed at the next stage boundary; finalization still
/// executes.
#[derive(Clone)]
pub struct AbortSignal {
    tx: watch::Sender<bool>,
}

impl AbortSignal {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Everything one pipeline run reads: immutable configuration, the
/// project-tree snapshot, the per-run capability cache, and the executor
/// factory.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub config: Arc<PipelineConfig>,
    pub fs: Arc<dyn FileSystem>,
    pub capabilities: Arc<Capabilities>,
    pub drivers: Arc<DriverRegistry>,
    pub executors: Arc<dyn ExecutorFactory>,
    aborted: watch::Receiver<bool>,
}

impl RunContext {
    pub fn new(
        config: PipelineConfig,
        fs: Arc<dyn FileSystem>,
        capabilities: Capabilities,
        executors: Arc<dyn ExecutorFactory>,
    ) -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);

        let ctx = Self {
            run_id: Uuid::new_v4(),
            config: Arc::new(config),
            fs,
            capabilities: Arc::new(capabilities),
            drivers: Arc::new(DriverRegistry::with_defaults()),
            executors,
            aborted: rx,
        };

        (ctx, AbortSignal { tx })
    }

    /// Production wiring: real filesystem, probed capabilities, host and
    /// Docker executors.
    pub async fn for_run(config: PipelineConfig, probe_tools: &[&str]) -> (Self, AbortSignal) {
        let capabilities = Capabilities::probe(probe_tools).await;
        let executors = Arc::new(DefaultExecutorFactory::new(
            config.cache_volume.clone(),
            capabilities.docker(),
        ));

        Self::new(
            config,
            Arc::new(RealFileSystem::new()),
            capabilities,
            executors,
        )
    }

    pub fn aborted(&self) -> bool {
        *self.aborted.borrow()
    }
}
