use clap::Parser;
use gantry::capability::{Capabilities, DEFAULT_PROBE_TOOLS, DOCTOR_TOOLS};
use gantry::cli::commands::{CliArgs, Commands, DoctorArgs, PlanArgs, RunArgs};
use gantry::cli::output::{DoctorReport, OutputFormatter};
use gantry::config::PipelineConfig;
use gantry::pipeline::{Orchestrator, RunContext};
use gantry::stage::PipelineStatus;
use gantry::util::logging::{self, LoggingConfig};
use gantry::{NAME, VERSION};

use std::env;
use std::fs;
use std::process;
use tracing::{debug, error, info, warn, Level};

const EXIT_SUCCEEDED: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_DEGRADED: i32 = 2;
const EXIT_CONFIG: i32 = 3;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Plan(plan_args) => handle_plan(plan_args).await,
        Commands::Doctor(doctor_args) => handle_doctor(doctor_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        logging::parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("GANTRY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        logging::parse_level(&level_str)
    };

    let use_json = env::var("GANTRY_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    logging::init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}

fn load_config(
    path: &std::path::Path,
    workspace: Option<&std::path::Path>,
    branch: Option<&str>,
) -> Result<PipelineConfig, i32> {
    let mut config = PipelineConfig::from_file(path).map_err(|e| {
        error!("Invalid pipeline configuration: {}", e);
        EXIT_CONFIG
    })?;

    if let Some(workspace) = workspace {
        config.workspace = workspace.to_path_buf();
    }
    if let Some(branch) = branch {
        config.branch = branch.to_string();
    }

    Ok(config)
}

async fn handle_run(args: &RunArgs) -> i32 {
    let mut config = match load_config(
        &args.config,
        args.workspace.as_deref(),
        args.branch.as_deref(),
    ) {
        Ok(config) => config,
        Err(code) => return code,
    };
    if args.with_tests {
        config.skip_tests = false;
    }

    let (ctx, abort) = RunContext::for_run(config, DEFAULT_PROBE_TOOLS).await;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Abort signal received; failing the run at the next stage boundary");
            abort.abort();
        }
    });

    let report = Orchestrator::new(ctx).run().await;

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_report(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            error!("Failed to format report: {:#}", e);
            return EXIT_FAILED;
        }
    }

    if let Some(path) = &args.report {
        let json = match serde_json::to_string_pretty(&report) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return EXIT_FAILED;
            }
        };
        if let Err(e) = fs::write(path, json) {
            error!("Failed to write report {}: {}", path.display(), e);
            return EXIT_FAILED;
        }
        info!(path = %path.display(), "Run report written");
    }

    match report.status {
        PipelineStatus::Succeeded => EXIT_SUCCEEDED,
        PipelineStatus::Degraded => EXIT_DEGRADED,
        PipelineStatus::Failed => EXIT_FAILED,
    }
}

async fn handle_plan(args: &PlanArgs) -> i32 {
    let config = match load_config(&args.config, args.workspace.as_deref(), None) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let (ctx, _abort) = RunContext::for_run(config, DEFAULT_PROBE_TOOLS).await;
    let plan = Orchestrator::new(ctx).plan();

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_plan(&plan) {
        Ok(text) => {
            println!("{}", text);
            EXIT_SUCCEEDED
        }
        Err(e) => {
            error!("Failed to format plan: {:#}", e);
            EXIT_FAILED
        }
    }
}

async fn handle_doctor(args: &DoctorArgs) -> i32 {
    let capabilities = Capabilities::probe(DOCTOR_TOOLS).await;

    let report = DoctorReport {
        tools: capabilities
            .tools()
            .map(|(name, available)| (name.to_string(), available))
            .collect(),
        container_backend: capabilities.docker(),
    };

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_doctor(&report) {
        Ok(text) => {
            println!("{}", text);
            EXIT_SUCCEEDED
        }
        Err(e) => {
            error!("Failed to format doctor report: {:#}", e);
            EXIT_FAILED
        }
    }
}
