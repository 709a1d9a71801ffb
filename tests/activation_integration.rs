//! Activation resolution against a real project tree

mod support;

use gantry::activation::{ActivationResolver, Predicate};
use gantry::capability::Capabilities;
use gantry::config::PipelineConfig;
use gantry::fs::RealFileSystem;
use gantry::stage::{PipelineStatus, StageStatus};
use std::fs;
use std::path::PathBuf;
use support::{harness, maven_tree};
use tempfile::TempDir;

fn hook_predicate(target: &str) -> Predicate {
    Predicate::All(vec![
        Predicate::FileExists(PathBuf::from("Makefile")),
        Predicate::TargetDefined {
            descriptor: PathBuf::from("Makefile"),
            target: target.to_string(),
        },
        Predicate::CapabilityAvailable("make".to_string()),
    ])
}

#[test]
fn resolves_hook_target_in_real_tree() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("Makefile"),
        "after-build:\n\tcp target/*.jar /srv/artifacts\n",
    )
    .unwrap();

    let fs = RealFileSystem::new();
    let capabilities = Capabilities::preset(&[("make", true)], false);
    let config = PipelineConfig::new("git@example.com:acme/app.git");
    let resolver = ActivationResolver::new(&fs, temp.path(), &capabilities, &config);

    assert!(resolver.should_run(&hook_predicate("after-build")));
    assert!(!resolver.should_run(&hook_predicate("before-build")));
}

#[test]
fn missing_descriptor_never_fails_resolution() {
    let temp = TempDir::new().unwrap();

    let fs = RealFileSystem::new();
    let capabilities = Capabilities::preset(&[("make", true)], false);
    let config = PipelineConfig::new("git@example.com:acme/app.git");
    let resolver = ActivationResolver::new(&fs, temp.path(), &capabilities, &config);

    assert!(!resolver.should_run(&hook_predicate("after-build")));
}

// Same tree, same config: repeated evaluation answers identically.
#[test]
fn resolution_is_idempotent_over_unchanged_tree() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("Makefile"), "before-package:\n\techo sign\n").unwrap();

    let fs = RealFileSystem::new();
    let capabilities = Capabilities::preset(&[("make", true)], false);
    let config = PipelineConfig::new("git@example.com:acme/app.git");
    let resolver = ActivationResolver::new(&fs, temp.path(), &capabilities, &config);

    let predicate = hook_predicate("before-package");
    let answers: Vec<bool> = (0..3).map(|_| resolver.should_run(&predicate)).collect();
    assert_eq!(answers, vec![true, true, true]);
}

// Config file through to a finished run: the YAML-declared custom stage
// executes and degrades the run when it fails.
#[tokio::test]
async fn config_file_drives_run_end_to_end() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("gantry.yaml");
    fs::write(
        &config_path,
        r#"
repository-url: "git@example.com:acme/billing.git"
clean-cache-before-build: false
custom-stages:
  lint:
    anchor: build
    edge: after
    command: "run-lint"
    policy: degrade
"#,
    )
    .unwrap();

    let mut config = PipelineConfig::from_file(&config_path).unwrap();
    config.workspace = PathBuf::from("/mock");

    let capabilities = Capabilities::preset(&[("make", true), ("git", true)], true);
    let h = harness(config, maven_tree(), capabilities);
    h.executor.fail_on("run-lint", 1);

    let report = h.orchestrator.run().await;

    assert_eq!(report.status, PipelineStatus::Degraded);
    assert_eq!(report.stage("lint").unwrap().status, StageStatus::Degraded);
    assert_eq!(report.stage("package").unwrap().status, StageStatus::Success);
}
