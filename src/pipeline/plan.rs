//! Plan composition
//!
//! Builds the ordered stage list for one run: the static mandatory
//! backbone, spliced at each anchor point with the activated hook stage
//! and the custom stage group registered there.

use crate::activation::ActivationResolver;
use crate::descriptor::ProjectKind;
use crate::stage::backbone::{
    self, HOOK_DESCRIPTOR, HOOK_TOOL,
};
use crate::stage::{
    Anchor, CustomStageRegistry, Edge, GroupPolicy, MandatoryStage, StageDef,
};
use tracing::{debug, info, warn};

use super::RunContext;

#[derive(Debug, Clone)]
pub enum PlanEntry {
    Stage(StageDef),
    /// Custom stages sharing one anchor, executed concurrently.
    Group {
        anchor: Anchor,
        policy: GroupPolicy,
        stages: Vec<StageDef>,
    },
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub project: Option<ProjectKind>,
    pub project_name: Option<String>,
}

impl Plan {
    /// Stage names in planned order, groups flattened. For display and
    /// assertions; group-internal order carries no execution guarantee.
    pub fn stage_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for entry in &self.entries {
            match entry {
                PlanEntry::Stage(def) => names.push(def.name.clone()),
                PlanEntry::Group { stages, .. } => {
                    names.extend(stages.iter().map(|s| s.name.clone()))
                }
            }
        }
        names
    }
}

pub struct Planner;

impl Planner {
    pub fn compose(ctx: &RunContext, custom: &CustomStageRegistry) -> Plan {
        let workspace = ctx.config.workspace.clone();
        let resolver =
            ActivationResolver::new(&*ctx.fs, &workspace, &ctx.capabilities, &ctx.config);

        let hook_tool_ok = ctx.capabilities.tool(HOOK_TOOL);
        if !hook_tool_ok && ctx.fs.exists(&workspace.join(HOOK_DESCRIPTOR)) {
            // One consolidated diagnostic, not one per hook.
            warn!(
                tool = HOOK_TOOL,
                "Hook tool unavailable; all hook stages will be skipped"
            );
        }

        let mut entries = Vec::new();

        for stage in MandatoryStage::ALL {
            Self::splice_anchor(
                ctx,
                custom,
                &resolver,
                &mut entries,
                Anchor::new(stage, Edge::Before),
                hook_tool_ok,
            );

            if stage == MandatoryStage::Build
                && resolver.should_run(&backbone::cache_purge_predicate())
            {
                debug!("Cache purge enabled");
                entries.push(PlanEntry::Stage(backbone::cache_purge_def()));
            }

            entries.push(PlanEntry::Stage(backbone::mandatory_def(stage)));

            Self::splice_anchor(
                ctx,
                custom,
                &resolver,
                &mut entries,
                Anchor::new(stage, Edge::After),
                hook_tool_ok,
            );
        }

        let project = ctx.drivers.detect(&*ctx.fs, &workspace);
        let project_name = project.and_then(|d| d.project_name(&*ctx.fs, &workspace));
        let project = project.map(|d| d.kind());

        let plan = Plan {
            entries,
            project,
            project_name,
        };

        info!(
            stages = plan.stage_names().len(),
            project = ?plan.project,
            "Pipeline plan composed"
        );

        plan
    }

    fn splice_anchor(
        ctx: &RunContext,
        custom: &CustomStageRegistry,
        resolver: &ActivationResolver<'_>,
        entries: &mut Vec<PlanEntry>,
        anchor: Anchor,
        hook_tool_ok: bool,
    ) {
        if hook_tool_ok && resolver.should_run(&backbone::hook_predicate(&anchor)) {
            debug!(hook = %anchor, "Hook activated");
            entries.push(PlanEntry::Stage(backbone::hook_def(
                &anchor,
                ctx.config.context_override(&anchor.key()),
            )));
        }

        let siblings = custom.anchored_at(anchor.stage, anchor.edge);
        if !siblings.is_empty() {
            entries.push(PlanEntry::Group {
                anchor,
                policy: ctx.config.group_policy(&anchor.key()),
                stages: siblings.iter().map(|s| s.def.clone()).collect(),
            });
        }
    }
}
