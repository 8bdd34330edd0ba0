//! Byte-code interpreter for DDP, a German-keyword imperative language.
//!
//! The pipeline is the textbook three stages: [`scanner`] turns source text
//! into a token stream, [`compiler`] walks it once with a precedence-climbing
//! parser that emits directly into a [`chunk::Chunk`], and [`vm`] runs that
//! chunk on a stack machine. [`run_source`] wires the three together for a
//! whole program; `src/cli.rs` is the thin binary-facing wrapper around it.

pub mod chunk;
pub mod compiler;
pub mod error;
pub mod intern;
pub mod natives;
pub mod scanner;
pub mod style;
pub mod token;
pub mod value;
pub mod vm;

pub mod cli;

use error::DdpError;
use intern::Interner;
use natives::NativeRegistry;
use std::io::Write;
use std::path::Path;

/// Scans, compiles, and runs `source`, writing program output to `stdout`.
/// `source_path` is used only for error messages and resolving `binde ...
/// ein.` include directives relative to the including file.
pub fn run_source(source: &str, source_path: impl AsRef<Path>, stdout: &mut dyn Write) -> Result<(), DdpError> {
    let mut interner = Interner::new();
    let scan = scanner::Scanner::new(source, source_path, &mut interner);
    let (tokens, lex_errors) = scan.scan();
    if !lex_errors.is_empty() {
        return Err(DdpError::Lexical(lex_errors));
    }

    let chunk = compiler::compile(tokens, &interner).map_err(DdpError::Compile)?;

    let natives = NativeRegistry::new();
    let mut machine = vm::Vm::new(&chunk, &mut interner, &natives, stdout);
    machine.run().map_err(DdpError::Runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_source_executes_a_print_statement() {
        let mut out = Vec::new();
        let result = run_source("$ 1 plus 1.\n", "test.ddp", &mut out);
        assert!(result.is_ok());
        assert_eq!(String::from_utf8(out).unwrap().trim(), "2");
    }

    #[test]
    fn run_source_reports_lexical_errors() {
        let mut out = Vec::new();
        let result = run_source("die Zahl x ist §.\n", "test.ddp", &mut out);
        assert!(matches!(result, Err(DdpError::Lexical(_))));
    }

    #[test]
    fn run_source_reports_compile_errors() {
        let mut out = Vec::new();
        let result = run_source("schreibe(x).\n", "test.ddp", &mut out);
        assert!(matches!(result, Err(DdpError::Compile(_))));
    }

    #[test]
    fn run_source_reports_runtime_errors() {
        let mut out = Vec::new();
        let result = run_source("die Zahl x ist 1 durch 0.\n", "test.ddp", &mut out);
        assert!(matches!(result, Err(DdpError::Runtime(_))));
    }
}
