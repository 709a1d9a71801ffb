//! gantry - CI pipeline stage orchestrator
//!
//! This library runs a fixed backbone of mandatory CI stages against a
//! checked-out project, augmented at run time with optional hook stages
//! contributed by the project itself and custom stages registered by the
//! caller.
//!
//! # Core Concepts
//!
//! - **Mandatory stages**: the platform-controlled backbone (setup, build,
//!   test, security-scan, package, archive). Their execution contexts are
//!   platform constants and cannot be overridden by configuration.
//! - **Hook stages**: derived from the project's `Makefile` - a
//!   `before-<stage>` or `after-<stage>` target activates a hook at that
//!   anchor point, provided the hook tool is available.
//! - **Custom stages**: registered in the pipeline configuration against an
//!   anchor point, with their own command or script and failure policy.
//!   Siblings at one anchor run concurrently under a per-group policy.
//! - **Execution contexts**: a stage body runs on the host or in a fresh
//!   container with the shared dependency cache volume mounted.
//!
//! # Example Usage
//!
//! ```ignore
//! use gantry::capability::DEFAULT_PROBE_TOOLS;
//! use gantry::config::PipelineConfig;
//! use gantry::pipeline::{Orchestrator, RunContext};
//!
//! async fn run_pipeline() -> gantry::stage::PipelineStatus {
//!     let config = PipelineConfig::new("git@example.com:acme/billing.git");
//!     let (ctx, _abort) = RunContext::for_run(config, DEFAULT_PROBE_TOOLS).await;
//!
//!     let report = Orchestrator::new(ctx).run().await;
//!     println!("{}: {}", report.status, report.reason);
//!     report.status
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`pipeline`]: plan composition, orchestration, and aggregation
//! - [`stage`]: the stage model, backbone constants, and custom registry
//! - [`activation`]: predicates deciding whether optional stages run
//! - [`descriptor`]: build descriptor detection and tool drivers
//! - [`exec`]: host and container execution contexts

pub mod activation;
pub mod capability;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod exec;
pub mod fs;
pub mod pipeline;
pub mod stage;
pub mod util;

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export key types for convenient access
pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{AbortSignal, Orchestrator, PipelineReport, RunContext};
pub use stage::{PipelineStatus, StageStatus};
