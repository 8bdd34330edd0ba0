//! `ddp` entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    ddp::cli::run_cli()
}
