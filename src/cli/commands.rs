use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CI pipeline stage orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "gantry",
    about = "CI pipeline stage orchestrator with hook activation and containerized execution",
    version,
    author,
    long_about = "gantry runs a fixed backbone of mandatory CI stages (setup, build, test, \
                  security-scan, package, archive) against a checked-out project, splicing in \
                  Makefile-target hook stages and configured custom stages at anchor points. \
                  Stages run on the host or in containers with a shared dependency cache.\n\n\
                  Exit codes: 0 succeeded, 1 failed, 2 degraded, 3 configuration error."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Increase verbosity")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Execute the pipeline",
        long_about = "Composes the stage plan for the configured project and executes it.\n\n\
                      Examples:\n  \
                      gantry run\n  \
                      gantry run --config ci/gantry.yaml --workspace /builds/checkout\n  \
                      gantry run --with-tests --format json --report run.json"
    )]
    Run(RunArgs),

    #[command(
        about = "Show the composed stage plan without executing it",
        long_about = "Resolves activation predicates against the workspace and prints the \
                      stage list the run would execute.\n\n\
                      Examples:\n  \
                      gantry plan\n  \
                      gantry plan --format yaml"
    )]
    Plan(PlanArgs),

    #[command(
        about = "Check external tool and container backend availability",
        long_about = "Probes the tools the pipeline depends on (make, git, build tools) and \
                      the Docker backend.\n\n\
                      Examples:\n  \
                      gantry doctor\n  \
                      gantry doctor --format json"
    )]
    Doctor(DoctorArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "gantry.yaml",
        help = "Pipeline configuration file (YAML or TOML)"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'w',
        long,
        value_name = "PATH",
        help = "Checked-out project workspace (overrides config)"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Branch to build (overrides config)")]
    pub branch: Option<String>,

    #[arg(long, help = "Run the test stage even if the config skips it")]
    pub with_tests: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        long,
        value_name = "FILE",
        help = "Write the JSON run report to a file"
    )]
    pub report: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "gantry.yaml",
        help = "Pipeline configuration file (YAML or TOML)"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'w',
        long,
        value_name = "PATH",
        help = "Checked-out project workspace (overrides config)"
    )]
    pub workspace: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct DoctorArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let args = CliArgs::parse_from(["gantry", "run"]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.config, PathBuf::from("gantry.yaml"));
                assert!(!run.with_tests);
                assert_eq!(run.format, OutputFormatArg::Human);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_plan_with_format() {
        let args = CliArgs::parse_from(["gantry", "plan", "--format", "yaml"]);
        match args.command {
            Commands::Plan(plan) => assert_eq!(plan.format, OutputFormatArg::Yaml),
            _ => panic!("expected plan subcommand"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = CliArgs::try_parse_from(["gantry", "-q", "-v", "doctor"]);
        assert!(result.is_err());
    }
}
