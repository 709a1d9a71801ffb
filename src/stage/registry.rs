//! Custom Stage Registry
//!
//! Maps anchor points to caller-supplied stage definitions. Stages sharing
//! one anchor form a sibling group executed concurrently under the anchor's
//! group policy.

use super::{Anchor, Edge, ExecContext, MandatoryStage, StageBody, StageDef, StageKind};
use crate::config::{CustomStageSpec, PipelineConfig};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CustomStageDef {
    pub anchor: Anchor,
    pub def: StageDef,
}

pub struct CustomStageRegistry {
    by_anchor: HashMap<String, Vec<CustomStageDef>>,
}

impl CustomStageRegistry {
    /// Expand the configuration's custom stage specs. Assumes a validated
    /// config; a spec with no executable body is registered as a warned
    /// no-op rather than aborting the pipeline.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut by_anchor: HashMap<String, Vec<CustomStageDef>> = HashMap::new();

        for (name, spec) in &config.custom_stages {
            let Some(stage) = MandatoryStage::from_name(&spec.anchor) else {
                warn!(stage = %name, anchor = %spec.anchor, "Skipping custom stage with unknown anchor");
                continue;
            };
            let anchor = Anchor::new(stage, spec.edge);

            let def = Self::expand(name, spec, config);
            by_anchor
                .entry(anchor.key())
                .or_default()
                .push(CustomStageDef { anchor, def });
        }

        Self { by_anchor }
    }

    fn expand(name: &str, spec: &CustomStageSpec, config: &PipelineConfig) -> StageDef {
        let body = if let Some(command) = &spec.command {
            StageBody::Command(command.clone())
        } else if let Some(script) = &spec.script {
            StageBody::Script(script.clone())
        } else {
            warn!(
                stage = %name,
                "Custom stage defines neither command nor script; treating as no-op"
            );
            StageBody::Empty
        };

        let image = spec
            .image
            .as_deref()
            .or_else(|| config.context_override(name));

        StageDef {
            name: name.to_string(),
            kind: StageKind::Custom,
            body,
            context: image
                .map(|i| ExecContext::Image(i.to_string()))
                .unwrap_or(ExecContext::Host),
            policy: spec.policy,
        }
    }

    /// Custom stages attached at the given anchor point, in registration
    /// order. Execution order within the group is unspecified: siblings
    /// run concurrently.
    pub fn anchored_at(&self, stage: MandatoryStage, edge: Edge) -> &[CustomStageDef] {
        self.by_anchor
            .get(&Anchor::new(stage, edge).key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::FailurePolicy;
    use std::path::PathBuf;

    fn config_with_stage(name: &str, spec: CustomStageSpec) -> PipelineConfig {
        let mut config = PipelineConfig::new("git@example.com:acme/app.git");
        config.custom_stages.insert(name.to_string(), spec);
        config
    }

    fn lint_spec() -> CustomStageSpec {
        CustomStageSpec {
            anchor: "build".to_string(),
            edge: Edge::After,
            image: None,
            command: Some("make lint".to_string()),
            script: None,
            policy: FailurePolicy::Degrade,
        }
    }

    #[test]
    fn test_anchored_lookup() {
        let config = config_with_stage("lint", lint_spec());
        let registry = CustomStageRegistry::from_config(&config);

        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].def.name, "lint");
        assert_eq!(
            stages[0].def.body,
            StageBody::Command("make lint".to_string())
        );

        assert!(registry
            .anchored_at(MandatoryStage::Build, Edge::Before)
            .is_empty());
        assert!(registry
            .anchored_at(MandatoryStage::Test, Edge::After)
            .is_empty());
    }

    #[test]
    fn test_script_body() {
        let mut spec = lint_spec();
        spec.command = None;
        spec.script = Some(PathBuf::from("ci/lint.sh"));

        let config = config_with_stage("lint", spec);
        let registry = CustomStageRegistry::from_config(&config);

        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(
            stages[0].def.body,
            StageBody::Script(PathBuf::from("ci/lint.sh"))
        );
    }

    #[test]
    fn test_bodyless_stage_becomes_noop() {
        let mut spec = lint_spec();
        spec.command = None;

        let config = config_with_stage("lint", spec);
        let registry = CustomStageRegistry::from_config(&config);

        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(stages[0].def.body, StageBody::Empty);
    }

    #[test]
    fn test_image_selects_container_context() {
        let mut spec = lint_spec();
        spec.image = Some("node:20".to_string());

        let config = config_with_stage("lint", spec);
        let registry = CustomStageRegistry::from_config(&config);

        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(
            stages[0].def.context,
            ExecContext::Image("node:20".to_string())
        );
    }

    #[test]
    fn test_context_override_map_applies_to_custom_stage() {
        let config = {
            let mut c = config_with_stage("lint", lint_spec());
            c.context_overrides
                .insert("lint".to_string(), "alpine:3.20".to_string());
            c
        };
        let registry = CustomStageRegistry::from_config(&config);

        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(
            stages[0].def.context,
            ExecContext::Image("alpine:3.20".to_string())
        );
    }

    #[test]
    fn test_siblings_share_anchor() {
        let mut config = config_with_stage("lint", lint_spec());
        config
            .custom_stages
            .insert("coverage".to_string(), lint_spec());

        let registry = CustomStageRegistry::from_config(&config);
        let stages = registry.anchored_at(MandatoryStage::Build, Edge::After);
        assert_eq!(stages.len(), 2);
    }
}
