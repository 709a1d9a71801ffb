use gantry::capability::Capabilities;
use gantry::config::{CustomStageSpec, PipelineConfig};
use gantry::exec::{MockExecutor, MockExecutorFactory};
use gantry::fs::MockFileSystem;
use gantry::pipeline::{AbortSignal, Orchestrator, RunContext};
use gantry::stage::{Edge, FailurePolicy};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Harness {
    pub executor: Arc<MockExecutor>,
    pub orchestrator: Orchestrator,
    #[allow(dead_code)]
    pub abort: AbortSignal,
}

/// Orchestrator wired to a scripted executor and an in-memory project
/// tree; nothing touches a shell or a container daemon.
pub fn harness(config: PipelineConfig, fs: MockFileSystem, capabilities: Capabilities) -> Harness {
    let executor = Arc::new(MockExecutor::new());
    let (ctx, abort) = RunContext::new(
        config,
        Arc::new(fs),
        capabilities,
        Arc::new(MockExecutorFactory::new(executor.clone())),
    );

    Harness {
        executor,
        orchestrator: Orchestrator::new(ctx),
        abort,
    }
}

/// Defaults for scenario tests: mock workspace, cache purge off so the
/// backbone is exactly the six mandatory stages.
#[allow(dead_code)]
pub fn base_config() -> PipelineConfig {
    let mut config = PipelineConfig::new("git@example.com:acme/billing.git");
    config.workspace = PathBuf::from("/mock");
    config.clean_cache_before_build = false;
    config
}

pub fn maven_tree() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(
        "pom.xml",
        r#"<project><artifactId>billing-service</artifactId></project>"#,
    );
    fs
}

#[allow(dead_code)]
pub fn custom_stage(
    anchor: &str,
    edge: Edge,
    command: &str,
    policy: FailurePolicy,
) -> CustomStageSpec {
    CustomStageSpec {
        anchor: anchor.to_string(),
        edge,
        image: None,
        command: Some(command.to_string()),
        script: None,
        policy,
    }
}
