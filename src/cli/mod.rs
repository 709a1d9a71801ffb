pub mod commands;
pub mod output;

pub use commands::{CliArgs, Commands, DoctorArgs, PlanArgs, RunArgs};
pub use output::{DoctorReport, OutputFormat, OutputFormatter};
