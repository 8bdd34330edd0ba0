use crate::error::LexError;
use crate::intern::Interner;
use crate::token::{Span, Token, TokenKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn keywords() -> HashMap<&'static str, TokenKind> {
    let mut m = HashMap::new();
    m.insert("mal", TokenKind::Mal);
    m.insert("minus", TokenKind::Minus);
    m.insert("durch", TokenKind::Durch);
    m.insert("modulo", TokenKind::Modulo);
    m.insert("hoch", TokenKind::Hoch);
    m.insert("Wurzel", TokenKind::Wurzel);
    m.insert("Ln", TokenKind::Ln);
    m.insert("Betrag", TokenKind::Betrag);
    m.insert("Pi", TokenKind::Pi);
    m.insert("e", TokenKind::E);
    m.insert("Tau", TokenKind::Tau);
    m.insert("Phi", TokenKind::Phi);
    m.insert("und", TokenKind::Und);
    m.insert("oder", TokenKind::Oder);
    m.insert("nicht", TokenKind::Nicht);
    m.insert("kleiner", TokenKind::Kleiner);
    m.insert("größer", TokenKind::Groesser);
    m.insert("als", TokenKind::Als);
    m.insert("ungleich", TokenKind::Ungleich);
    m.insert("gleich", TokenKind::Gleich);
    m.insert("um", TokenKind::Um);
    m.insert("Bit", TokenKind::Bit);
    m.insert("nach", TokenKind::Nach);
    m.insert("rechts", TokenKind::Rechts);
    m.insert("links", TokenKind::Links);
    m.insert("verschoben", TokenKind::Verschoben);
    m.insert("logisch", TokenKind::Logisch);
    m.insert("kontra", TokenKind::Kontra);
    m.insert("wenn", TokenKind::Wenn);
    m.insert("aber", TokenKind::Aber);
    m.insert("dann", TokenKind::Dann);
    m.insert("sonst", TokenKind::Sonst);
    m.insert("für", TokenKind::Fuer);
    m.insert("jede", TokenKind::Jede);
    m.insert("von", TokenKind::Von);
    m.insert("bis", TokenKind::Bis);
    m.insert("mit", TokenKind::Mit);
    m.insert("Schrittgröße", TokenKind::Schrittgroesse);
    m.insert("solange", TokenKind::Solange);
    m.insert("mache", TokenKind::Mache);
    m.insert("Funktion", TokenKind::Funktion);
    m.insert("macht", TokenKind::Macht);
    m.insert("vom", TokenKind::Vom);
    m.insert("Typ", TokenKind::Typ);
    m.insert("ist", TokenKind::Ist);
    m.insert("sind", TokenKind::Sind);
    m.insert("der", TokenKind::Der);
    m.insert("die", TokenKind::Die);
    m.insert("das", TokenKind::Das);
    m.insert("Zahl", TokenKind::Zahl);
    m.insert("Kommazahl", TokenKind::Kommazahl);
    m.insert("Boolean", TokenKind::Boolean);
    m.insert("Buchstabe", TokenKind::Buchstabe);
    m.insert("Text", TokenKind::Text);
    m.insert("Zahlen", TokenKind::Zahlen);
    m.insert("Kommazahlen", TokenKind::Kommazahlen);
    m.insert("Booleans", TokenKind::Booleans);
    m.insert("Buchstaben", TokenKind::Buchstaben);
    m.insert("Texte", TokenKind::Texte);
    m.insert("an", TokenKind::An);
    m.insert("der Stelle", TokenKind::Stelle);
    m.insert("Stelle", TokenKind::Stelle);
    m.insert("Stück", TokenKind::Stueck);
    m.insert("wahr", TokenKind::Wahr);
    m.insert("falsch", TokenKind::Falsch);
    m.insert("gib", TokenKind::Gib);
    m.insert("zurück", TokenKind::Zurueck);
    m.insert("binde", TokenKind::Binde);
    m.insert("ein", TokenKind::Ein);
    m
}

/// UTF-8-aware but byte-level lexer. Identifier characters are detected a
/// byte at a time, with German umlauts and ß special-cased as the
/// `0xC3`-lead two-byte sequences they actually encode to.
pub struct Scanner<'a> {
    source: &'a [u8],
    source_path: PathBuf,
    start: usize,
    current: usize,
    line: u32,
    depth: u32,
    consecutive_spaces: u32,
    keywords: HashMap<&'static str, TokenKind>,
    interner: &'a mut Interner,
    errors: Vec<LexError>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, source_path: impl AsRef<Path>, interner: &'a mut Interner) -> Self {
        Scanner {
            source: source.as_bytes(),
            source_path: source_path.as_ref().to_path_buf(),
            start: 0,
            current: 0,
            line: 1,
            depth: 0,
            consecutive_spaces: 0,
            keywords: keywords(),
            interner,
            errors: Vec::new(),
        }
    }

    /// Scans the full token stream, applying the post-pass keyword fusions
    /// and expanding `binde ... ein.` includes. Returns `Ok` with the token
    /// stream even if lexical errors were recorded, matching the original
    /// scanner's "collect everything, report at the end" behavior; callers
    /// check `errors()` to decide whether to proceed to compilation.
    pub fn scan(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            self.start = self.current;
            if self.is_at_end() {
                tokens.push(self.make_token(TokenKind::End));
                break;
            }
            tokens.push(self.scan_token());
        }
        let fused = fuse_tokens(tokens, &self.keywords, self.interner);
        let expanded = expand_includes(fused, &self.source_path, self.interner, &mut self.errors);
        (expanded, self.errors)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let b = self.source[self.current];
        self.current += 1;
        b
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.source[self.current] }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() { 0 } else { self.source[self.current + 1] }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' => {
                    self.advance();
                    self.consecutive_spaces += 1;
                    if self.consecutive_spaces == 4 {
                        self.depth += 1;
                        self.consecutive_spaces = 0;
                    }
                }
                b'\t' => {
                    self.advance();
                    self.depth += 1;
                    self.consecutive_spaces = 0;
                }
                b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    self.advance();
                    self.line += 1;
                    self.depth = 0;
                    self.consecutive_spaces = 0;
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                b'/' if self.peek_next() == b'*' => {
                    self.advance();
                    self.advance();
                    while !self.is_at_end() && !(self.peek() == b'*' && self.peek_next() == b'/') {
                        if self.peek() == b'\n' {
                            self.line += 1;
                            self.depth = 0;
                            self.consecutive_spaces = 0;
                        }
                        self.advance();
                    }
                    if !self.is_at_end() {
                        self.advance();
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        let b = self.advance();
        match b {
            b':' => self.make_token(TokenKind::Colon),
            b'.' => self.make_token(TokenKind::Dot),
            b',' => self.make_token(TokenKind::Comma),
            b'(' => self.make_token(TokenKind::LeftParen),
            b')' => self.make_token(TokenKind::RightParen),
            b'[' => self.make_token(TokenKind::LeftSquareBracket),
            b']' => self.make_token(TokenKind::RightSquareBracket),
            b';' => self.make_token(TokenKind::Semicolon),
            b'+' => self.make_token(TokenKind::Plus),
            // Unlike most binary operators, unary negation is a symbol, not
            // the keyword "minus"; there is no `->` form.
            b'-' => self.make_token(TokenKind::NegateMinus),
            b'$' => self.make_token(TokenKind::Print),
            b'"' => self.string(),
            b'\'' => self.character(),
            b'0'..=b'9' => self.number(),
            _ if is_identifier_byte(b) => self.identifier(),
            _ => self.error_token("Unerwartetes Zeichen."),
        }
    }

    fn identifier(&mut self) -> Token {
        while !self.is_at_end() && is_identifier_continue(self.source, self.current) {
            self.advance_identifier_byte();
        }
        let text = String::from_utf8_lossy(&self.source[self.start..self.current]).into_owned();
        let kind = self.keywords.get(text.as_str()).copied().unwrap_or(TokenKind::Identifier);
        self.make_token(kind)
    }

    fn advance_identifier_byte(&mut self) {
        // Umlauts are a 0xC3 lead byte followed by a continuation byte;
        // consume both so the continuation is never re-scanned on its own.
        let b = self.advance();
        if b == 0xC3 {
            self.advance();
        }
    }

    /// Scans a string literal, expanding `\\`, `\"`, `\n`, `\t`, `\r` into
    /// their single-byte meaning as it goes (building a fresh buffer rather
    /// than mutating `source` in place, unlike the original scanner). Any
    /// other escape is a lexical error.
    fn string(&mut self) -> Token {
        let mut buf = Vec::new();
        loop {
            if self.is_at_end() {
                return self.error_token("Unfertiger Text!");
            }
            if self.peek() == b'"' {
                break;
            }
            if self.peek() == b'\\' {
                let escaped = match self.peek_next() {
                    b'\\' => b'\\',
                    b'"' => b'"',
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    _ => return self.error_token("Unfertige Escape-Sequenz!"),
                };
                buf.push(escaped);
                self.advance();
                self.advance();
            } else {
                buf.push(self.advance());
            }
            if buf.last() == Some(&b'\n') {
                self.line += 1;
            }
        }
        self.advance(); // closing quote
        self.make_token_from_bytes(TokenKind::StringLit, buf)
    }

    fn character(&mut self) -> Token {
        let mut buf = Vec::new();
        loop {
            if self.is_at_end() {
                return self.error_token("Unbeendetes Zeichenliteral.");
            }
            if self.peek() == b'\'' {
                break;
            }
            if self.peek() == b'\\' {
                let escaped = match self.peek_next() {
                    b'\\' => b'\\',
                    b'\'' => b'\'',
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    _ => return self.error_token("Unfertige Escape-Sequenz!"),
                };
                buf.push(escaped);
                self.advance();
                self.advance();
            } else {
                buf.push(self.advance());
            }
            if buf.last() == Some(&b'\n') {
                self.line += 1;
            }
        }
        self.advance(); // closing quote
        if buf.len() > 2 || (buf.len() == 2 && buf[0] != 0xC3) {
            return self.error_token("Zu langes Buchstaben Literal!");
        }
        self.make_token_from_bytes(TokenKind::CharLit, buf)
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let mut is_double = false;
        // Only consume the `.` as a decimal point when followed by a digit;
        // `3.` as a bare statement terminator must stay a separate DOT, and
        // `3.Wurzel` is handled by the fusion pass, not here.
        if self.peek() == b',' && self.peek_next().is_ascii_digit() {
            is_double = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make_token(if is_double { TokenKind::DoubleLit } else { TokenKind::IntLit })
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        let text = String::from_utf8_lossy(&self.source[self.start..self.current]).into_owned();
        let lexeme = self.interner.intern(&text);
        Token::new(kind, lexeme, Span::new(self.start, self.current), self.line, self.depth)
    }

    /// Like `make_token`, but interns `bytes` as the lexeme instead of the
    /// raw source slice — used for string/char literals once escapes have
    /// already been expanded into a separate buffer.
    fn make_token_from_bytes(&mut self, kind: TokenKind, bytes: Vec<u8>) -> Token {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let lexeme = self.interner.intern(&text);
        Token::new(kind, lexeme, Span::new(self.start, self.current), self.line, self.depth)
    }

    fn error_token(&mut self, message: &str) -> Token {
        self.errors.push(LexError { message: message.to_string(), line: self.line });
        let lexeme = self.interner.intern("");
        Token::new(TokenKind::Error, lexeme, Span::new(self.start, self.current), self.line, self.depth)
    }
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == 0xC3
}

fn is_identifier_continue(source: &[u8], pos: usize) -> bool {
    let b = source[pos];
    b.is_ascii_alphanumeric() || b == b'_' || b == 0xC3
}

/// Post-scan fusion pass: a single forward sweep that merges the scanner's
/// multi-word keyword sequences into single tokens. Mirrors the original
/// scanner's rewrite pass, run once tokenization is complete rather than
/// inline, since several fusions need one or two tokens of lookahead.
fn fuse_tokens(tokens: Vec<Token>, _keywords: &HashMap<&'static str, TokenKind>, interner: &mut Interner) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        // "Betrag von" -> Betrag
        if t.kind == TokenKind::Betrag {
            if let Some(next) = tokens.get(i + 1) {
                if interner.resolve(next.lexeme) == "von" {
                    out.push(t.clone());
                    i += 2;
                    continue;
                }
            }
        }
        // "logisch nicht" -> LOGISCHNICHT
        if t.kind == TokenKind::Logisch {
            if let Some(next) = tokens.get(i + 1) {
                if next.kind == TokenKind::Nicht {
                    let mut fused = t.clone();
                    fused.kind = TokenKind::LogischNicht;
                    out.push(fused);
                    i += 2;
                    continue;
                }
            }
        }
        // "größer als" / "größer als , oder" ; "kleiner als" / "kleiner als , oder"
        if t.kind == TokenKind::Kleiner || t.kind == TokenKind::Groesser {
            if let Some(als_tok) = tokens.get(i + 1) {
                if als_tok.kind == TokenKind::Als {
                    if let (Some(comma), Some(oder)) = (tokens.get(i + 2), tokens.get(i + 3)) {
                        if comma.kind == TokenKind::Comma && oder.kind == TokenKind::Oder {
                            let mut fused = t.clone();
                            fused.kind = if t.kind == TokenKind::Kleiner {
                                TokenKind::KleinerOder
                            } else {
                                TokenKind::GroesserOder
                            };
                            out.push(fused);
                            i += 4;
                            continue;
                        }
                    }
                    out.push(t.clone());
                    i += 2;
                    continue;
                }
            }
        }
        // "INUMBER . Wurzel von" -> INUMBER Wurzel
        if t.kind == TokenKind::IntLit || t.kind == TokenKind::DoubleLit {
            if let (Some(dot), Some(wurzel)) = (tokens.get(i + 1), tokens.get(i + 2)) {
                if dot.kind == TokenKind::Dot && wurzel.kind == TokenKind::Wurzel {
                    out.push(t.clone());
                    out.push(wurzel.clone());
                    if let Some(von) = tokens.get(i + 3) {
                        if interner.resolve(von.lexeme) == "von" {
                            i += 4;
                            continue;
                        }
                    }
                    i += 3;
                    continue;
                }
            }
        }
        // "an der Stelle" -> an
        if t.kind == TokenKind::An {
            if let (Some(der), Some(stelle)) = (tokens.get(i + 1), tokens.get(i + 2)) {
                if der.kind == TokenKind::Der && stelle.kind == TokenKind::Stelle {
                    out.push(t.clone());
                    i += 3;
                    continue;
                }
            }
        }
        out.push(t.clone());
        i += 1;
    }
    out
}

/// Resolves `binde "path" ein.` directives by recursively scanning the
/// referenced file and splicing its tokens in place (minus its own trailing
/// END). A missing include file is a lexical error reported at the
/// including `binde` token's line; scanning of the includer continues past
/// the failed directive.
fn expand_includes(
    tokens: Vec<Token>,
    including_path: &Path,
    interner: &mut Interner,
    errors: &mut Vec<LexError>,
) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let t = &tokens[i];
        if t.kind == TokenKind::Binde {
            if let (Some(path_tok), Some(ein_tok), Some(dot_tok)) =
                (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3))
            {
                if path_tok.kind == TokenKind::StringLit
                    && ein_tok.kind == TokenKind::Ein
                    && dot_tok.kind == TokenKind::Dot
                {
                    let raw = interner.resolve(path_tok.lexeme).to_string();
                    let include_path = resolve_include_path(including_path, &raw);
                    match std::fs::read_to_string(&include_path) {
                        Ok(contents) => {
                            let sub_scanner = Scanner::new(&contents, &include_path, interner);
                            let (sub_tokens, sub_errors) = sub_scanner.scan();
                            errors.extend(sub_errors);
                            out.extend(sub_tokens.into_iter().filter(|tok| tok.kind != TokenKind::End));
                        }
                        Err(_) => {
                            errors.push(LexError {
                                message: format!(
                                    "Die Datei '{}' konnte nicht zum Einbinden geöffnet werden!",
                                    include_path.display()
                                ),
                                line: t.line,
                            });
                        }
                    }
                    i += 4;
                    continue;
                }
            }
        }
        out.push(t.clone());
        i += 1;
    }
    out
}

fn resolve_include_path(including_path: &Path, name: &str) -> PathBuf {
    let dir = including_path.parent().unwrap_or_else(|| Path::new("."));
    let mut path = dir.join(name);
    if path.extension().is_none() {
        path.set_extension("ddp");
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_str(src: &str) -> (Vec<Token>, Vec<LexError>) {
        let mut interner = Interner::new();
        let scanner = Scanner::new(src, "test.ddp", &mut interner);
        scanner.scan()
    }

    #[test]
    fn scans_simple_keyword() {
        let (tokens, errors) = scan_str("wenn");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Wenn);
    }

    #[test]
    fn scans_integer_literal() {
        let (tokens, _) = scan_str("42");
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
    }

    #[test]
    fn scans_double_literal_with_comma() {
        let (tokens, _) = scan_str("3,5");
        assert_eq!(tokens[0].kind, TokenKind::DoubleLit);
    }

    #[test]
    fn bare_dot_after_integer_is_not_a_decimal() {
        let (tokens, _) = scan_str("3.");
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn four_spaces_increments_depth() {
        let (tokens, _) = scan_str("    wenn");
        assert_eq!(tokens[0].depth, 1);
    }

    #[test]
    fn three_spaces_does_not_increment_depth() {
        let (tokens, _) = scan_str("   wenn");
        assert_eq!(tokens[0].depth, 0);
    }

    #[test]
    fn newline_resets_depth() {
        let (tokens, _) = scan_str("    wenn\nwahr");
        assert_eq!(tokens[1].depth, 0);
    }

    #[test]
    fn fuses_betrag_von() {
        let (tokens, _) = scan_str("Betrag von");
        assert_eq!(tokens[0].kind, TokenKind::Betrag);
        assert_eq!(tokens[1].kind, TokenKind::End);
    }

    #[test]
    fn fuses_logisch_nicht() {
        let (tokens, _) = scan_str("logisch nicht");
        assert_eq!(tokens[0].kind, TokenKind::LogischNicht);
    }

    #[test]
    fn fuses_groesser_als_oder() {
        let (tokens, _) = scan_str("größer als , oder");
        assert_eq!(tokens[0].kind, TokenKind::GroesserOder);
    }

    #[test]
    fn fuses_an_der_stelle() {
        let (tokens, _) = scan_str("an der Stelle");
        assert_eq!(tokens[0].kind, TokenKind::An);
        assert_eq!(tokens[1].kind, TokenKind::End);
    }

    #[test]
    fn missing_include_file_is_a_lex_error() {
        let (_, errors) = scan_str("binde \"does_not_exist\" ein.");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn bare_minus_is_negate_minus() {
        let (tokens, _) = scan_str("-5");
        assert_eq!(tokens[0].kind, TokenKind::NegateMinus);
    }

    #[test]
    fn minus_keyword_is_the_binary_operator() {
        let (tokens, _) = scan_str("minus");
        assert_eq!(tokens[0].kind, TokenKind::Minus);
    }

    #[test]
    fn dollar_scans_as_print() {
        let (tokens, _) = scan_str("$");
        assert_eq!(tokens[0].kind, TokenKind::Print);
    }

    #[test]
    fn line_comment_is_skipped() {
        let (tokens, _) = scan_str("wenn // das ist ein Kommentar\nwahr");
        assert_eq!(tokens[0].kind, TokenKind::Wenn);
        assert_eq!(tokens[1].kind, TokenKind::Wahr);
    }

    #[test]
    fn block_comment_is_skipped() {
        let (tokens, _) = scan_str("wenn /* mehrzeilig\nimmer noch drin */ wahr");
        assert_eq!(tokens[0].kind, TokenKind::Wenn);
        assert_eq!(tokens[1].kind, TokenKind::Wahr);
    }

    #[test]
    fn string_literal_expands_escapes() {
        let mut interner = Interner::new();
        let scanner = Scanner::new(r#""a\nb\tc\"d""#, "test.ddp", &mut interner);
        let (tokens, errors) = scanner.scan();
        assert!(errors.is_empty());
        assert_eq!(interner.resolve(tokens[0].lexeme), "a\nb\tc\"d");
    }

    #[test]
    fn unknown_escape_is_a_lex_error() {
        let (_, errors) = scan_str(r#""a\qb""#);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn char_literal_content_has_no_quotes() {
        let mut interner = Interner::new();
        let scanner = Scanner::new("'x'", "test.ddp", &mut interner);
        let (tokens, _) = scanner.scan();
        assert_eq!(interner.resolve(tokens[0].lexeme), "x");
    }
}
