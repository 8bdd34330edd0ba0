use crate::style::Style;
use crate::value::ValueType;
use std::fmt;

/// A single lexical failure, found while scanning.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: u32,
}

/// A single static failure, found while compiling. The compiler accumulates
/// these across `synchronize()` recovery points rather than stopping at the
/// first one.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
}

/// A single failure raised while executing a chunk. Execution always stops
/// at the first one.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        RuntimeError { message: message.into(), line }
    }

    pub fn type_mismatch(expected: ValueType, found: ValueType, line: u32) -> Self {
        RuntimeError::new(
            format!("Erwartet wurde ein Wert vom Typ {}, aber gefunden wurde {}!", expected, found),
            line,
        )
    }

    pub fn stack_overflow(line: u32) -> Self {
        RuntimeError::new("Stapel Überfluss!", line)
    }
}

#[derive(Debug, Clone)]
pub enum DdpError {
    Lexical(Vec<LexError>),
    Compile(Vec<CompileError>),
    Runtime(RuntimeError),
}

impl DdpError {
    /// The BSD `sysexits.h` exit code matching the failing stage: compile
    /// failures (lexical or static) are data errors, runtime failures are
    /// software errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            DdpError::Lexical(_) | DdpError::Compile(_) => 65,
            DdpError::Runtime(_) => 70,
        }
    }

    pub fn render(&self, source: &str) -> String {
        match self {
            DdpError::Lexical(errs) => errs
                .iter()
                .map(|e| render_line_error(source, e.line, &e.message))
                .collect::<Vec<_>>()
                .join("\n\n"),
            DdpError::Compile(errs) => errs
                .iter()
                .map(|e| render_line_error(source, e.line, &e.message))
                .collect::<Vec<_>>()
                .join("\n\n"),
            DdpError::Runtime(e) => render_line_error(source, e.line, &e.message),
        }
    }
}

impl fmt::Display for DdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DdpError::Lexical(errs) => {
                for e in errs {
                    writeln!(f, "[Zeile {}] Fehler: {}", e.line, e.message)?;
                }
                Ok(())
            }
            DdpError::Compile(errs) => {
                for e in errs {
                    writeln!(f, "[Zeile {}] Fehler: {}", e.line, e.message)?;
                }
                Ok(())
            }
            DdpError::Runtime(e) => write!(f, "[Zeile {}] Fehler: {}", e.line, e.message),
        }
    }
}

impl std::error::Error for DdpError {}

fn render_line_error(source: &str, line: u32, message: &str) -> String {
    let error_label = Style::bold_red("error");
    let line_content = source.lines().nth(line.saturating_sub(1) as usize).unwrap_or("");
    let line_num = Style::blue(&format!("{:4}", line));
    let pipe = Style::blue("|");
    format!("{}: {}\n\n{} {} {}", error_label, message, line_num, pipe, line_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_error_exit_code_is_65() {
        let err = DdpError::Lexical(vec![LexError { message: "x".into(), line: 1 }]);
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn compile_error_exit_code_is_65() {
        let err = DdpError::Compile(vec![CompileError { message: "x".into(), line: 1 }]);
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn runtime_error_exit_code_is_70() {
        let err = DdpError::Runtime(RuntimeError::new("x", 1));
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn render_includes_offending_line() {
        let source = "schreibe 1 +.\n";
        let err = DdpError::Runtime(RuntimeError::new("Fehler", 1));
        let rendered = err.render(source);
        assert!(rendered.contains("schreibe 1 +."));
    }

    #[test]
    fn stack_overflow_message_matches_original_wording() {
        let err = RuntimeError::stack_overflow(3);
        assert_eq!(err.message, "Stapel Überfluss!");
    }
}
