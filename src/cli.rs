//! Command-line interface for the `ddp` interpreter.
//!
//! One subcommand-free binary: `ddp [-ascii] <source-path>` reads the file,
//! runs it through [`crate::run_source`], and exits 0 on success or the
//! `sysexits.h` code matching the failing stage on error.

use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::value::set_ascii_mode;

#[derive(Parser)]
#[command(name = "ddp")]
#[command(about = "Interpreter for DDP, a German-keyword imperative language", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the `.ddp` program to run.
    pub source: PathBuf,

    /// Render Buchstabe/Text output as one byte per character instead of
    /// the default UTF-8-aware decoding.
    #[arg(long = "ascii")]
    pub ascii: bool,
}

pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    set_ascii_mode(cli.ascii);

    let source = match fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Die Datei '{}' konnte nicht gelesen werden: {}", cli.source.display(), e);
            return ExitCode::from(66); // EX_NOINPUT
        }
    };

    let stdout = io::stdout();
    let mut lock = stdout.lock();
    match crate::run_source(&source, &cli.source, &mut lock) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.render(&source));
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_source_path_and_ascii_flag() {
        let cli = Cli::parse_from(["ddp", "--ascii", "prog.ddp"]);
        assert!(cli.ascii);
        assert_eq!(cli.source, PathBuf::from("prog.ddp"));
    }

    #[test]
    fn cli_defaults_ascii_to_false() {
        let cli = Cli::parse_from(["ddp", "prog.ddp"]);
        assert!(!cli.ascii);
    }
}
