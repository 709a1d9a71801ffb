//! Platform-defined backbone
//!
//! These definitions are process-wide constants: mandatory stage bodies,
//! contexts, and policies are fixed here and are not parameterizable by the
//! pipeline configuration beyond what the orchestrator explicitly allows
//! for hook and custom stages.

use super::{
    Anchor, ExecContext, FailurePolicy, MandatoryStage, StageBody, StageDef, StageKind,
};
use crate::activation::Predicate;
use crate::descriptor::DriverAction;
use crate::exec::CACHE_MOUNT;
use std::path::PathBuf;

/// Build descriptor inspected for hook targets.
pub const HOOK_DESCRIPTOR: &str = "Makefile";

/// Tool that executes hook targets. Governs activation of every hook.
pub const HOOK_TOOL: &str = "make";

/// Image for platform utility stages that need a shell but no toolchain.
pub const UTILITY_IMAGE: &str = "busybox:1.36";

pub const CACHE_PURGE_STAGE: &str = "clean-cache";
pub const FINALIZE_STAGE: &str = "finalize";

pub fn mandatory_def(stage: MandatoryStage) -> StageDef {
    let body = match stage {
        // Checkout is an external collaborator; setup verifies the
        // workspace it handed over.
        MandatoryStage::Setup => {
            StageBody::Command("git rev-parse --is-inside-work-tree".to_string())
        }
        MandatoryStage::Build => StageBody::Driver(DriverAction::Build),
        MandatoryStage::Test => StageBody::Driver(DriverAction::Test),
        MandatoryStage::SecurityScan => StageBody::Driver(DriverAction::SecurityScan),
        MandatoryStage::Package => StageBody::Driver(DriverAction::Package),
        MandatoryStage::Archive => StageBody::Archive,
    };

    let context = match stage {
        MandatoryStage::Setup | MandatoryStage::Archive => ExecContext::Host,
        _ => ExecContext::ToolContainer,
    };

    StageDef {
        name: stage.name().to_string(),
        kind: StageKind::Mandatory,
        body,
        context,
        policy: FailurePolicy::Abort,
    }
}

/// Hook stage for an anchor point. The target name is the anchor key
/// (`before-build`, `after-test`, ...); the body invokes the hook tool.
pub fn hook_def(anchor: &Anchor, image_override: Option<&str>) -> StageDef {
    let target = anchor.key();

    StageDef {
        name: target.clone(),
        kind: StageKind::Hook,
        body: StageBody::Command(format!("{} {}", HOOK_TOOL, target)),
        context: image_override
            .map(|image| ExecContext::Image(image.to_string()))
            .unwrap_or(ExecContext::Host),
        policy: FailurePolicy::Degrade,
    }
}

/// A hook runs only if the descriptor exists, declares the target, and the
/// hook tool is available.
pub fn hook_predicate(anchor: &Anchor) -> Predicate {
    Predicate::All(vec![
        Predicate::FileExists(PathBuf::from(HOOK_DESCRIPTOR)),
        Predicate::TargetDefined {
            descriptor: PathBuf::from(HOOK_DESCRIPTOR),
            target: anchor.key(),
        },
        Predicate::CapabilityAvailable(HOOK_TOOL.to_string()),
    ])
}

/// Cache purge before Build, in a container with the cache volume mounted.
pub fn cache_purge_def() -> StageDef {
    StageDef {
        name: CACHE_PURGE_STAGE.to_string(),
        kind: StageKind::Hook,
        body: StageBody::Command(format!("rm -rf {}/*", CACHE_MOUNT)),
        context: ExecContext::Image(UTILITY_IMAGE.to_string()),
        policy: FailurePolicy::Degrade,
    }
}

pub fn cache_purge_predicate() -> Predicate {
    Predicate::FlagEnabled("clean-cache-before-build".to_string())
}

/// Workspace cleanup. Always executes; its failure is logged and never
/// changes the already-decided terminal state.
pub fn finalize_def() -> StageDef {
    StageDef {
        name: FINALIZE_STAGE.to_string(),
        kind: StageKind::Mandatory,
        body: StageBody::Command("git clean -ffdx".to_string()),
        context: ExecContext::Host,
        policy: FailurePolicy::Degrade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Edge;

    #[test]
    fn test_mandatory_stages_abort_on_failure() {
        for stage in MandatoryStage::ALL {
            let def = mandatory_def(stage);
            assert_eq!(def.policy, FailurePolicy::Abort, "stage {}", stage);
            assert_eq!(def.kind, StageKind::Mandatory);
        }
    }

    #[test]
    fn test_driver_stages_run_in_tool_container() {
        for stage in [
            MandatoryStage::Build,
            MandatoryStage::Test,
            MandatoryStage::SecurityScan,
            MandatoryStage::Package,
        ] {
            assert_eq!(mandatory_def(stage).context, ExecContext::ToolContainer);
        }
        assert_eq!(
            mandatory_def(MandatoryStage::Setup).context,
            ExecContext::Host
        );
        assert_eq!(
            mandatory_def(MandatoryStage::Archive).context,
            ExecContext::Host
        );
    }

    #[test]
    fn test_hook_body_invokes_make_target() {
        let anchor = Anchor::new(MandatoryStage::Build, Edge::After);
        let def = hook_def(&anchor, None);

        assert_eq!(def.name, "after-build");
        assert_eq!(def.body, StageBody::Command("make after-build".to_string()));
        assert_eq!(def.context, ExecContext::Host);
        assert_eq!(def.policy, FailurePolicy::Degrade);
    }

    #[test]
    fn test_hook_context_override() {
        let anchor = Anchor::new(MandatoryStage::Test, Edge::Before);
        let def = hook_def(&anchor, Some("node:20"));

        assert_eq!(def.context, ExecContext::Image("node:20".to_string()));
    }

    #[test]
    fn test_cache_purge_targets_cache_mount() {
        let def = cache_purge_def();
        assert!(matches!(
            &def.body,
            StageBody::Command(cmd) if cmd.contains(CACHE_MOUNT)
        ));
        assert_eq!(def.policy, FailurePolicy::Degrade);
    }
}
