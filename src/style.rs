//! Small ANSI coloring helper for diagnostic rendering. Colors are only
//! applied when stdout looks like a terminal; piping output to a file or
//! another process gets plain text.

use std::io::IsTerminal;

fn enabled() -> bool {
    std::io::stdout().is_terminal()
}

fn wrap(code: &str, text: &str) -> String {
    if enabled() {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

pub struct Style;

impl Style {
    pub fn bold_red(text: &str) -> String {
        wrap("1;31", text)
    }

    pub fn red(text: &str) -> String {
        wrap("31", text)
    }

    pub fn blue(text: &str) -> String {
        wrap("34", text)
    }

    pub fn cyan(text: &str) -> String {
        wrap("36", text)
    }

    pub fn green(text: &str) -> String {
        wrap("32", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_without_terminal_is_plain() {
        // test runs detached from a tty, so these should be unstyled.
        assert_eq!(Style::red("x"), "x");
        assert_eq!(Style::bold_red("x"), "x");
    }
}
