mod app;
mod cli;
mod executor;
mod logging;

use std::process::ExitCode;

use printscan_core::targets;

use crate::cli::CommandLine;
use crate::executor::build_runtime;
use crate::logging::init_logging;

fn main() -> ExitCode {
    let cli = CommandLine::parse_args();
    init_logging(cli.log_level);

    tracing::debug!(target: targets::CLI, log_level = %cli.log_level, "printscan starting");

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(target: targets::CLI, error = %error, "Failed to start runtime");
            eprintln!("printscan: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(app::run(cli))
}
