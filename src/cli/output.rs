//! Output formatting for multiple formats
//!
//! Formatters for JSON, YAML, and human-readable text. Human output is
//! colorized only when stdout is a terminal.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::pipeline::{Plan, PlanEntry, PipelineReport};
use crate::stage::{PipelineStatus, StageStatus};

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// Capability probe results for the `doctor` command.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub tools: BTreeMap<String, bool>,
    pub container_backend: bool,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_report(&self, report: &PipelineReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize run report to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize run report to YAML")
            }
            OutputFormat::Human => Ok(self.format_report_human(report)),
        }
    }

    pub fn format_plan(&self, plan: &Plan) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&plan_value(plan))
                .context("Failed to serialize plan to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&plan_value(plan))
                .context("Failed to serialize plan to YAML"),
            OutputFormat::Human => Ok(self.format_plan_human(plan)),
        }
    }

    pub fn format_doctor(&self, report: &DoctorReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize doctor report to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize doctor report to YAML")
            }
            OutputFormat::Human => Ok(self.format_doctor_human(report)),
        }
    }

    fn format_report_human(&self, report: &PipelineReport) -> String {
        let mut out = String::new();

        out.push_str(&format!("Pipeline run {}\n", report.run_id));
        out.push_str(&format!(
            "  Repository: {} (branch {})\n",
            report.repository, report.branch
        ));
        out.push_str(&format!(
            "  Status: {} - {}\n",
            paint_pipeline(report.status),
            report.reason
        ));
        out.push_str(&format!("  Duration: {}ms\n", report.duration_ms));
        out.push_str("  Stages:\n");

        for stage in &report.stages {
            out.push_str(&format!(
                "    {:<22} {:<10} {:>8}ms",
                stage.stage,
                paint_stage(stage.status),
                stage.duration_ms
            ));
            if let Some(code) = stage.exit_code {
                if code != 0 {
                    out.push_str(&format!("  (exit {})", code));
                }
            }
            out.push('\n');
        }

        if let Some(finalization) = &report.finalization {
            out.push_str(&format!(
                "  Finalization: {}\n",
                paint_stage(finalization.status)
            ));
        }

        out
    }

    fn format_plan_human(&self, plan: &Plan) -> String {
        let mut out = String::new();

        match (&plan.project, &plan.project_name) {
            (Some(kind), Some(name)) => {
                out.push_str(&format!("Project: {} ({})\n", name, kind))
            }
            (Some(kind), None) => out.push_str(&format!("Project type: {}\n", kind)),
            _ => out.push_str("Project type: unrecognized\n"),
        }

        out.push_str("Planned stages:\n");
        let mut position = 1;
        for entry in &plan.entries {
            match entry {
                PlanEntry::Stage(def) => {
                    out.push_str(&format!(
                        "  {:>2}. {:<22} [{}] {} on {}\n",
                        position, def.name, def.kind, policy_label(def), def.context
                    ));
                    position += 1;
                }
                PlanEntry::Group {
                    anchor,
                    policy,
                    stages,
                } => {
                    out.push_str(&format!(
                        "  {:>2}. concurrent group at {} ({:?})\n",
                        position, anchor, policy
                    ));
                    for def in stages {
                        out.push_str(&format!(
                            "        - {:<18} [{}] {} on {}\n",
                            def.name, def.kind, policy_label(def), def.context
                        ));
                    }
                    position += 1;
                }
            }
        }

        out
    }

    fn format_doctor_human(&self, report: &DoctorReport) -> String {
        let mut out = String::new();
        out.push_str("Capability check:\n");

        for (tool, available) in &report.tools {
            out.push_str(&format!(
                "  {:<12} {}\n",
                tool,
                paint_bool(*available)
            ));
        }
        out.push_str(&format!(
            "  {:<12} {}\n",
            "docker",
            paint_bool(report.container_backend)
        ));

        out
    }
}

fn policy_label(def: &crate::stage::StageDef) -> &'static str {
    match def.policy {
        crate::stage::FailurePolicy::Abort => "abort",
        crate::stage::FailurePolicy::Degrade => "degrade",
    }
}

fn plan_value(plan: &Plan) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = plan
        .entries
        .iter()
        .map(|entry| match entry {
            PlanEntry::Stage(def) => json!({
                "stage": def.name,
                "kind": def.kind,
                "policy": def.policy,
                "context": def.context.to_string(),
            }),
            PlanEntry::Group {
                anchor,
                policy,
                stages,
            } => json!({
                "group": anchor.key(),
                "group-policy": policy,
                "stages": stages.iter().map(|def| json!({
                    "stage": def.name,
                    "kind": def.kind,
                    "policy": def.policy,
                    "context": def.context.to_string(),
                })).collect::<Vec<_>>(),
            }),
        })
        .collect();

    json!({
        "project": plan.project,
        "project-name": plan.project_name,
        "stages": entries,
    })
}

fn use_color() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn paint(text: &str, code: &str) -> String {
    if use_color() {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn paint_pipeline(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Succeeded => paint("Succeeded", "32"),
        PipelineStatus::Degraded => paint("Degraded", "33"),
        PipelineStatus::Failed => paint("Failed", "31"),
    }
}

fn paint_stage(status: StageStatus) -> String {
    match status {
        StageStatus::Success => paint("success", "32"),
        StageStatus::Degraded => paint("degraded", "33"),
        StageStatus::Failed => paint("failed", "31"),
        StageStatus::Skipped => paint("skipped", "90"),
    }
}

fn paint_bool(available: bool) -> String {
    if available {
        paint("available", "32")
    } else {
        paint("missing", "31")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{RunResult, StageKind};
    use chrono::Utc;

    fn sample_report() -> PipelineReport {
        PipelineReport {
            run_id: "test-run".to_string(),
            repository: "git@example.com:acme/app.git".to_string(),
            branch: "main".to_string(),
            status: PipelineStatus::Degraded,
            reason: "custom stage 'lint' failed under degrade policy".to_string(),
            stages: vec![RunResult {
                stage: "build".to_string(),
                kind: StageKind::Mandatory,
                status: StageStatus::Success,
                exit_code: Some(0),
                output: String::new(),
                started_at: Utc::now(),
                duration_ms: 1200,
            }],
            finalization: None,
            started_at: Utc::now(),
            duration_ms: 1500,
        }
    }

    #[test]
    fn test_json_report_round_trips() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_report(&sample_report()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["stages"][0]["stage"], "build");
    }

    #[test]
    fn test_yaml_report() {
        let formatter = OutputFormatter::new(OutputFormat::Yaml);
        let output = formatter.format_report(&sample_report()).unwrap();
        assert!(output.contains("run_id: test-run"));
    }

    #[test]
    fn test_human_report_names_reason() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let output = formatter.format_report(&sample_report()).unwrap();

        assert!(output.contains("custom stage 'lint' failed under degrade policy"));
        assert!(output.contains("build"));
    }

    #[test]
    fn test_doctor_human() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let mut tools = BTreeMap::new();
        tools.insert("make".to_string(), true);
        tools.insert("git".to_string(), false);

        let output = formatter
            .format_doctor(&DoctorReport {
                tools,
                container_backend: false,
            })
            .unwrap();

        assert!(output.contains("make"));
        assert!(output.contains("git"));
        assert!(output.contains("docker"));
    }
}
