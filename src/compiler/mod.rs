mod rules;
mod scope;
mod types;

pub use rules::Precedence;
pub use scope::{Local, ScopeUnit};
pub use types::{article_matches, promote, ArticleGender};

use crate::chunk::{Chunk, OpCode};
use crate::error::CompileError;
use crate::intern::{Interner, Symbol};
use crate::natives;
use crate::token::{Token, TokenKind};
use crate::value::{Value, ValueType};
use std::collections::HashMap;

/// Where the most recently compiled primary expression came from, if it was
/// a bare variable reference. `index_expr()` needs this to emit a write-back
/// store after mutating an array element in place; it is cleared by every
/// other prefix handler so a stale reference can never be written through.
#[derive(Debug, Clone, Copy)]
enum BaseLoc {
    Local(u8),
    Global(Symbol),
}

/// Single-pass compiler: a precedence-climbing expression parser plus a
/// recursive-descent statement parser, emitting directly into a `Chunk` as
/// it goes (no intermediate AST). The whole source file is treated as one
/// implicit parameterless top-level function returning `None`.
pub struct Compiler<'a> {
    tokens: Vec<Token>,
    current: usize,
    chunk: Chunk,
    scope: ScopeUnit,
    globals: HashMap<crate::intern::Symbol, ValueType>,
    interner: &'a Interner,
    errors: Vec<CompileError>,
    panic_mode: bool,
    /// The statically-known type of the expression most recently compiled;
    /// infix operator handlers read this to type-check their left operand
    /// without needing the recursive-descent call to return it explicitly.
    last_type: ValueType,
    /// Set only when `last_type` came straight from a bare variable
    /// reference; `index_expr()` consumes it to write a mutated array
    /// element back into its variable.
    last_base: Option<BaseLoc>,
}

impl<'a> Compiler<'a> {
    pub fn new(tokens: Vec<Token>, interner: &'a Interner) -> Self {
        Compiler {
            tokens,
            current: 0,
            chunk: Chunk::new(),
            scope: ScopeUnit::new(),
            globals: HashMap::new(),
            interner,
            errors: Vec::new(),
            panic_mode: false,
            last_type: ValueType::None,
            last_base: None,
        }
    }

    pub fn compile(mut self) -> Result<Chunk, Vec<CompileError>> {
        while !self.check(TokenKind::End) {
            self.declaration();
        }
        let line = self.previous().line;
        self.chunk.write_op(OpCode::None, line);
        self.chunk.write_op(OpCode::Return, line);
        if self.errors.is_empty() {
            Ok(self.chunk)
        } else {
            Err(self.errors)
        }
    }

    // -- token cursor -----------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.current].clone();
        if self.current + 1 < self.tokens.len() {
            self.current += 1;
        }
        t
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.check(kind) {
            self.advance();
        } else {
            let found = self.peek().kind;
            self.error_at_current(&format!("{} (gefunden: {:?})", message, found));
        }
    }

    fn error_at_current(&mut self, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let line = self.peek().line;
        self.errors.push(CompileError { message: message.to_string(), line });
    }

    fn lexeme(&self, token: &Token) -> &str {
        self.interner.resolve(token.lexeme)
    }

    /// Recovers after a compile error by skipping tokens until a likely
    /// statement boundary, mirroring the original compiler's
    /// `synchronize()` so one mistake doesn't cascade into dozens.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::End) {
            if self.previous().kind == TokenKind::Dot {
                return;
            }
            match self.peek().kind {
                TokenKind::Der
                | TokenKind::Die
                | TokenKind::Das
                | TokenKind::Wenn
                | TokenKind::Solange
                | TokenKind::Fuer
                | TokenKind::Gib => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // -- declarations & statements -----------------------------------------

    fn declaration(&mut self) {
        if matches!(self.peek().kind, TokenKind::Der | TokenKind::Die | TokenKind::Das) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let article = match self.advance().kind {
            TokenKind::Der => ArticleGender::Der,
            TokenKind::Die => ArticleGender::Die,
            TokenKind::Das => ArticleGender::Das,
            _ => unreachable!(),
        };
        let type_kind = self.advance().kind;
        let value_type = match type_kind_to_value_type(type_kind) {
            Some(t) => t,
            None => {
                self.error_at_current("Erwartet wurde ein Typname (Zahl, Kommazahl, Boolean, Buchstabe, Text, ...).");
                return;
            }
        };
        if !article_matches(article, value_type) {
            self.error_at_current(&format!(
                "'{}' passt nicht zum Geschlecht von '{:?}'.",
                article.german_word(),
                value_type
            ));
        }
        self.consume(TokenKind::Identifier, "Erwartet wurde ein Variablenname.");
        let name_token = self.previous().clone();
        let name = name_token.lexeme;
        let line = name_token.line;

        if self.matches(TokenKind::Ist) {
            if value_type.is_array() {
                self.error_at_current(
                    "Beim Definieren einer Variablen-Gruppe wird 'sind' anstatt 'ist' erwartet!",
                );
            }
            if value_type == ValueType::Boolean {
                let rhs = self.bool_assignment_value();
                if rhs != ValueType::Boolean {
                    self.error_at_current("Beim Definieren eines Booleans muss 'wahr' oder 'falsch' stehen!");
                }
            } else {
                self.expression();
                self.check_assignable(value_type, line);
            }
        } else if self.matches(TokenKind::Sind) {
            if !value_type.is_array() {
                self.error_at_current(
                    "Beim Definieren einer einzelnen Variable wird 'ist' anstatt 'sind' erwartet!",
                );
            }
            self.expression();
            if self.last_type == ValueType::Zahl && self.matches(TokenKind::Stueck) {
                let elem_type = value_type.element_type().unwrap_or(ValueType::Zahl);
                self.chunk.write_op(OpCode::ArrayOfSize, line);
                self.chunk.write(elem_type as u8, line);
                self.last_type = value_type;
            } else if self.last_type != value_type {
                self.error_at_current(&format!(
                    "Einer Variable kann nur ein Wert vom gleichen Typ zugewiesen werden (erwartet {}, gefunden {}).",
                    value_type, self.last_type
                ));
            }
        } else {
            self.error_at_current("Eine Variable muss immer initialisiert werden!");
        }
        self.consume(TokenKind::Dot, "Erwartet wurde '.' am Ende der Deklaration.");

        if self.scope.scope_depth == 0 {
            self.globals.insert(name, value_type);
            if let Some(idx) = self.chunk.add_constant(Value::String(self.interner.resolve(name).to_string())) {
                self.chunk.write_op(OpCode::DefineGlobal, line);
                self.chunk.write(idx, line);
            } else {
                self.error_at_current("Zu viele Konstanten in einem Chunk.");
            }
        } else {
            if self.scope.declare(name, value_type).is_none() {
                self.error_at_current("Zu viele lokale Variablen in diesem Gültigkeitsbereich.");
            }
            self.chunk.write_op(OpCode::DefineLocal, line);
        }
    }

    fn check_assignable(&mut self, declared: ValueType, line: u32) {
        if promote(declared, self.last_type).is_none() && declared != self.last_type {
            self.error_at_current(&format!(
                "Erwartet wurde ein Wert vom Typ {}, aber gefunden wurde {} (Zeile {}).",
                declared, self.last_type, line
            ));
        }
    }

    fn statement(&mut self) {
        match self.peek().kind {
            TokenKind::Wenn => self.if_statement(),
            TokenKind::Solange => self.while_statement(),
            TokenKind::Fuer => self.for_statement(),
            TokenKind::Gib => self.return_statement(),
            TokenKind::Print => self.print_statement(),
            _ => self.expression_statement(),
        }
    }

    /// The debug-print statement: `$ <expr>.`
    fn print_statement(&mut self) {
        self.advance(); // $
        self.expression();
        let line = self.previous().line;
        self.chunk.write_op(OpCode::Print, line);
        self.consume(TokenKind::Dot, "Erwartet wurde '.' nach '$'.");
    }

    fn block_depth(&self) -> u32 {
        self.scope.scope_depth + 1
    }

    fn block(&mut self) {
        self.scope.begin_scope();
        let required = self.block_depth();
        while self.peek().depth >= required && !self.check(TokenKind::End) {
            self.declaration();
        }
        let popped = self.scope.end_scope();
        let line = self.previous().line;
        for _ in 0..popped {
            self.chunk.write_op(OpCode::Pop, line);
        }
    }

    fn if_statement(&mut self) {
        self.advance(); // wenn
        self.expression();
        self.expect_bool_condition();
        self.consume(TokenKind::Dann, "Erwartet wurde 'dann' nach der Bedingung.");
        self.consume(TokenKind::Colon, "Erwartet wurde ':' nach 'dann'.");
        let line = self.previous().line;

        let else_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.chunk.write_op(OpCode::Pop, line);
        self.block();

        let mut end_jumps = vec![self.emit_jump(OpCode::Jump, line)];
        self.patch_jump(else_jump);
        self.chunk.write_op(OpCode::Pop, line);

        while self.check(TokenKind::Aber) {
            self.advance();
            self.consume(TokenKind::Wenn, "Erwartet wurde 'wenn' nach 'aber'.");
            self.expression();
            self.expect_bool_condition();
            self.consume(TokenKind::Dann, "Erwartet wurde 'dann'.");
            self.consume(TokenKind::Colon, "Erwartet wurde ':'.");
            let line = self.previous().line;
            let next_jump = self.emit_jump(OpCode::JumpIfFalse, line);
            self.chunk.write_op(OpCode::Pop, line);
            self.block();
            end_jumps.push(self.emit_jump(OpCode::Jump, line));
            self.patch_jump(next_jump);
            self.chunk.write_op(OpCode::Pop, line);
        }

        if self.matches(TokenKind::Sonst) {
            self.consume(TokenKind::Colon, "Erwartet wurde ':' nach 'sonst'.");
            self.block();
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
    }

    fn while_statement(&mut self) {
        self.advance(); // solange
        let loop_start = self.chunk.code.len();
        self.expression();
        self.expect_bool_condition();
        self.consume(TokenKind::Mache, "Erwartet wurde 'mache' nach der Bedingung.");
        self.consume(TokenKind::Colon, "Erwartet wurde ':' nach 'mache'.");
        let line = self.previous().line;

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.chunk.write_op(OpCode::Pop, line);
        self.block();
        self.emit_loop(loop_start, line);
        self.patch_jump(exit_jump);
        self.chunk.write_op(OpCode::Pop, line);
    }

    /// Lowers `für jede Zahl x von a bis b [mit Schrittgröße s] mache:` to a
    /// counted loop. The comparison that tests whether the loop should
    /// continue is emitted as `ForTest`, this crate's non-self-modifying
    /// stand-in for the original VM's in-place `GREATER`-to-`LESS` opcode
    /// rewrite: the VM decides the direction the first time the test runs
    /// and remembers it by instruction offset.
    fn for_statement(&mut self) {
        self.advance(); // für
        self.consume(TokenKind::Jede, "Erwartet wurde 'jede' nach 'für'.");
        self.consume(TokenKind::Zahl, "Erwartet wurde 'Zahl' (nur Zahl-Schleifen werden unterstützt).");
        self.consume(TokenKind::Identifier, "Erwartet wurde der Name der Laufvariable.");
        let loop_var = self.previous().lexeme;
        let line = self.previous().line;

        self.consume(TokenKind::Von, "Erwartet wurde 'von' nach dem Namen der Laufvariable.");
        self.expression();
        if self.last_type != ValueType::Zahl {
            self.error_at_current("Der Startwert einer für-Schleife muss eine Zahl sein.");
        }

        self.scope.begin_scope();
        let slot = self.scope.declare(loop_var, ValueType::Zahl);
        self.chunk.write_op(OpCode::DefineLocal, line);
        let slot = match slot {
            Some(s) => s,
            None => {
                self.error_at_current("Zu viele lokale Variablen in diesem Gültigkeitsbereich.");
                0
            }
        };

        self.consume(TokenKind::Bis, "Erwartet wurde 'bis' nach dem Startwert.");
        self.chunk.write_op(OpCode::ForPrep, line);

        let test_offset = self.chunk.code.len();
        self.chunk.write_op(OpCode::GetLocal, line);
        self.chunk.write(slot, line);
        self.expression();
        if self.last_type != ValueType::Zahl {
            self.error_at_current("Der Endwert einer für-Schleife muss eine Zahl sein.");
        }

        let step_line = self.previous().line;
        let step_const = if self.matches(TokenKind::Mit) {
            self.consume(TokenKind::Schrittgroesse, "Erwartet wurde 'Schrittgröße' nach 'mit'.");
            self.expression();
            if self.last_type != ValueType::Zahl {
                self.error_at_current("Die Schrittgröße muss eine Zahl sein.");
            }
            None
        } else {
            self.chunk.add_constant(Value::Int(1))
        };

        self.chunk.write_op(OpCode::ForTest, step_line);
        self.consume(TokenKind::Mache, "Erwartet wurde 'mache' nach den Schleifengrenzen.");
        self.consume(TokenKind::Colon, "Erwartet wurde ':' nach 'mache'.");
        let line = self.previous().line;

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse, line);
        self.chunk.write_op(OpCode::Pop, line);
        self.block();

        self.chunk.write_op(OpCode::GetLocal, line);
        self.chunk.write(slot, line);
        if let Some(idx) = step_const {
            self.chunk.write_op(OpCode::Constant, line);
            self.chunk.write(idx, line);
        }
        self.chunk.write_op(OpCode::Add, line);
        self.chunk.write_op(OpCode::SetLocal, line);
        self.chunk.write(slot, line);
        self.chunk.write_op(OpCode::Pop, line);

        self.emit_loop(test_offset, line);
        self.patch_jump(exit_jump);
        self.chunk.write_op(OpCode::Pop, line);
        self.chunk.write_op(OpCode::ForDone, line);
        let popped = self.scope.end_scope();
        for _ in 0..popped {
            self.chunk.write_op(OpCode::Pop, line);
        }
    }

    fn return_statement(&mut self) {
        self.advance(); // gib
        let line = self.previous().line;
        if self.matches(TokenKind::Zurueck) {
            self.chunk.write_op(OpCode::None, line);
            self.chunk.write_op(OpCode::Return, line);
        } else {
            self.expression();
            self.consume(TokenKind::Zurueck, "Erwartet wurde 'zurück' nach dem Rückgabewert.");
            self.chunk.write_op(OpCode::Return, line);
        }
        self.consume(TokenKind::Dot, "Erwartet wurde '.' nach 'zurück'.");
    }

    fn expression_statement(&mut self) {
        self.expression();
        let line = self.previous().line;
        self.chunk.write_op(OpCode::Pop, line);
        self.consume(TokenKind::Dot, "Erwartet wurde '.' am Ende der Anweisung.");
    }

    fn expect_bool_condition(&mut self) {
        if self.last_type != ValueType::Boolean {
            self.error_at_current("Die Bedingung muss ein Boolean sein.");
        }
    }

    // -- jumps --------------------------------------------------------------

    fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.chunk.write_op(op, line);
        self.chunk.write(0xFF, line);
        self.chunk.write(0xFF, line);
        self.chunk.code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.chunk.code.len() - offset - 2;
        self.chunk.code[offset] = (jump >> 8) as u8;
        self.chunk.code[offset + 1] = (jump & 0xFF) as u8;
    }

    fn emit_loop(&mut self, loop_start: usize, line: u32) {
        self.chunk.write_op(OpCode::Loop, line);
        let offset = self.chunk.code.len() - loop_start + 2;
        self.chunk.write((offset >> 8) as u8, line);
        self.chunk.write((offset & 0xFF) as u8, line);
    }

    // -- expressions (precedence climbing) -----------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, min_prec: Precedence) {
        self.advance();
        let can_assign = min_prec <= Precedence::Assignment;
        self.prefix(self.previous().kind.clone(), can_assign);

        while rules::infix_precedence(self.peek().kind) >= min_prec {
            self.advance();
            self.infix(self.previous().kind, can_assign);
        }

        if can_assign && (self.check(TokenKind::Ist) || self.check(TokenKind::Sind)) {
            self.error_at_current("Ungültiges Zuweisungsziel!");
        }
    }

    fn prefix(&mut self, kind: TokenKind, can_assign: bool) {
        self.last_base = None;
        match kind {
            TokenKind::IntLit => self.int_literal(),
            TokenKind::DoubleLit => self.double_literal(),
            TokenKind::StringLit => self.string_literal(),
            TokenKind::CharLit => self.char_literal(),
            TokenKind::Wahr => self.bool_literal(true),
            TokenKind::Falsch => self.bool_literal(false),
            TokenKind::Pi => self.math_constant(std::f64::consts::PI),
            TokenKind::Tau => self.math_constant(std::f64::consts::TAU),
            TokenKind::E => self.math_constant(std::f64::consts::E),
            TokenKind::Phi => self.math_constant(1.618_033_988_749_895),
            TokenKind::Identifier => self.identifier_or_call(can_assign),
            TokenKind::LeftParen => self.grouping(),
            TokenKind::LeftSquareBracket => self.array_literal(),
            TokenKind::Minus => self.unary_negate(),
            TokenKind::Nicht | TokenKind::LogischNicht => self.unary_not(),
            TokenKind::Betrag => self.unary_betrag(),
            TokenKind::Ln => self.unary_ln(),
            _ => {
                let line = self.previous().line;
                self.errors.push(CompileError {
                    message: format!("Erwartet wurde ein Ausdruck, aber gefunden wurde {:?}.", kind),
                    line,
                });
                self.panic_mode = true;
            }
        }
    }

    fn infix(&mut self, kind: TokenKind, can_assign: bool) {
        match kind {
            TokenKind::Plus => self.binary_arith(OpCode::Add, "+"),
            TokenKind::Minus => self.binary_arith(OpCode::Subtract, "-"),
            TokenKind::Mal => self.binary_arith(OpCode::Multiply, "mal"),
            TokenKind::Durch => self.binary_arith(OpCode::Divide, "durch"),
            TokenKind::Modulo => self.binary_arith(OpCode::Modulo, "modulo"),
            TokenKind::Hoch => self.binary_exponent(),
            TokenKind::Wurzel => self.binary_wurzel(),
            TokenKind::Und => self.binary_logic(OpCode::And),
            TokenKind::Oder => self.binary_logic(OpCode::Or),
            TokenKind::Gleich => self.binary_equality(OpCode::Equal),
            TokenKind::Ungleich => self.binary_equality(OpCode::NotEqual),
            TokenKind::Kleiner => self.binary_comparison(OpCode::Less),
            TokenKind::KleinerOder => self.binary_comparison(OpCode::LessEqual),
            TokenKind::Groesser => self.binary_comparison(OpCode::Greater),
            TokenKind::GroesserOder => self.binary_comparison(OpCode::GreaterEqual),
            TokenKind::Um => self.shift_expr(),
            TokenKind::An => self.index_expr(can_assign),
            _ => unreachable!("infix() called for non-operator token {:?}", kind),
        }
    }

    fn int_literal(&mut self) {
        let text = self.lexeme(self.previous()).to_string();
        let value: i32 = text.parse().unwrap_or(0);
        self.emit_constant(Value::Int(value));
        self.last_type = ValueType::Zahl;
    }

    fn double_literal(&mut self) {
        let text = self.lexeme(self.previous()).replace(',', ".");
        let value: f64 = text.parse().unwrap_or(0.0);
        self.emit_constant(Value::Double(value));
        self.last_type = ValueType::Kommazahl;
    }

    fn string_literal(&mut self) {
        let text = self.lexeme(self.previous()).to_string();
        self.emit_constant(Value::String(text));
        self.last_type = ValueType::Text;
    }

    fn char_literal(&mut self) {
        let text = self.lexeme(self.previous());
        let code = text.encode_utf16().next().unwrap_or(0);
        self.emit_constant(Value::Char(code));
        self.last_type = ValueType::Buchstabe;
    }

    fn bool_literal(&mut self, value: bool) {
        let line = self.previous().line;
        self.chunk.write_op(if value { OpCode::True } else { OpCode::False }, line);
        self.last_type = ValueType::Boolean;
    }

    /// The right-hand side of a `Boolean` declaration. Handles the
    /// `wahr wenn <bool-expr>` / `falsch wenn <bool-expr>` sugar (the
    /// latter negates the expression's result) in addition to a bare
    /// `wahr`/`falsch` literal or a general boolean-typed expression.
    fn bool_assignment_value(&mut self) -> ValueType {
        if self.matches(TokenKind::Wahr) {
            if self.matches(TokenKind::Wenn) {
                self.expression();
                if self.last_type != ValueType::Boolean {
                    self.error_at_current("Nach 'wahr wenn' wird ein Boolean-Ausdruck erwartet.");
                }
            } else {
                self.bool_literal(true);
            }
        } else if self.matches(TokenKind::Falsch) {
            if self.matches(TokenKind::Wenn) {
                self.expression();
                if self.last_type != ValueType::Boolean {
                    self.error_at_current("Nach 'falsch wenn' wird ein Boolean-Ausdruck erwartet.");
                }
                let line = self.previous().line;
                self.chunk.write_op(OpCode::Not, line);
            } else {
                self.bool_literal(false);
            }
        } else {
            self.expression();
        }
        self.last_type
    }

    fn math_constant(&mut self, value: f64) {
        self.emit_constant(Value::Double(value));
        self.last_type = ValueType::Kommazahl;
    }

    /// Dispatches a bare identifier to either a variable reference/assignment
    /// or, when immediately followed by `(`, a native function call - the
    /// only kind of call this crate compiles (see `native_call`).
    fn identifier_or_call(&mut self, can_assign: bool) {
        if self.check(TokenKind::LeftParen) {
            self.native_call();
        } else {
            self.variable(can_assign);
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous().lexeme;
        let line = self.previous().line;

        let located = if let Some((slot, ty)) = self.scope.resolve(name) {
            Some((BaseLoc::Local(slot), ty))
        } else {
            self.globals.get(&name).map(|&ty| (BaseLoc::Global(name), ty))
        };

        let (base, var_type) = match located {
            Some(x) => x,
            None => {
                self.errors.push(CompileError {
                    message: format!("Die Variable '{}' wurde noch nicht deklariert.", self.interner.resolve(name)),
                    line,
                });
                self.panic_mode = true;
                self.last_type = ValueType::None;
                self.last_base = None;
                return;
            }
        };

        if can_assign && (self.check(TokenKind::Ist) || self.check(TokenKind::Sind)) {
            let wants_sind = self.check(TokenKind::Sind);
            self.advance();
            if wants_sind && !var_type.is_array() {
                self.error_at_current("'sind' ist nur für Variablen-Gruppen gültig, erwartet wurde 'ist'.");
            } else if !wants_sind && var_type.is_array() {
                self.error_at_current("'ist' ist nur für einzelne Variablen gültig, erwartet wurde 'sind'.");
            }
            self.expression();
            self.check_assignable(var_type, line);
            self.emit_set(&base, line);
            self.last_type = var_type;
            self.last_base = Some(base);
            return;
        }

        self.emit_get(&base, line);
        self.last_type = var_type;
        self.last_base = Some(base);
    }

    fn emit_get(&mut self, base: &BaseLoc, line: u32) {
        match base {
            BaseLoc::Local(slot) => {
                self.chunk.write_op(OpCode::GetLocal, line);
                self.chunk.write(*slot, line);
            }
            BaseLoc::Global(name) => {
                let name_str = self.interner.resolve(*name).to_string();
                match self.chunk.add_constant(Value::String(name_str)) {
                    Some(idx) => {
                        self.chunk.write_op(OpCode::GetGlobal, line);
                        self.chunk.write(idx, line);
                    }
                    None => self.error_at_current("Zu viele Konstanten in einem Chunk."),
                }
            }
        }
    }

    fn emit_set(&mut self, base: &BaseLoc, line: u32) {
        match base {
            BaseLoc::Local(slot) => {
                self.chunk.write_op(OpCode::SetLocal, line);
                self.chunk.write(*slot, line);
            }
            BaseLoc::Global(name) => {
                let name_str = self.interner.resolve(*name).to_string();
                match self.chunk.add_constant(Value::String(name_str)) {
                    Some(idx) => {
                        self.chunk.write_op(OpCode::SetGlobal, line);
                        self.chunk.write(idx, line);
                    }
                    None => self.error_at_current("Zu viele Konstanten in einem Chunk."),
                }
            }
        }
    }

    /// `name(arg1; arg2; ...)` - the only call syntax this crate compiles,
    /// since user-defined `Funktion`s are out of scope (see Non-goals); every
    /// callee is looked up in the native signature table at compile time.
    /// Arguments are separated the same way array-literal elements are
    /// (`;`), keeping the grammar's one separator convention for lists.
    fn native_call(&mut self) {
        let name_sym = self.previous().lexeme;
        let line = self.previous().line;
        let name = self.interner.resolve(name_sym).to_string();
        self.advance(); // '('
        let sig = natives::lookup_signature(&name);

        let mut argc: u8 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if let Some(sig) = &sig {
                    if let Some(expected) = sig.params.get(argc as usize) {
                        if !expected.accepts(self.last_type) {
                            self.error_at_current(&format!(
                                "Argument {} von '{}' erwartet {}, gefunden wurde {}.",
                                argc + 1,
                                name,
                                expected,
                                self.last_type
                            ));
                        }
                    }
                }
                argc = argc.saturating_add(1);
                if !self.matches(TokenKind::Semicolon) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Erwartet wurde ')' nach den Argumenten eines Aufrufs.");

        match &sig {
            Some(sig) => {
                if argc as usize != sig.params.len() {
                    self.error_at_current(&format!(
                        "'{}' erwartet {} Argument(e), übergeben wurden {}.",
                        name,
                        sig.params.len(),
                        argc
                    ));
                }
                self.last_type = sig.return_type;
            }
            None => {
                self.error_at_current(&format!("Unbekannte Funktion '{}'.", name));
                self.last_type = ValueType::None;
            }
        }

        match self.chunk.add_constant(Value::String(name)) {
            Some(idx) => {
                self.chunk.write_op(OpCode::Call, line);
                self.chunk.write(idx, line);
                self.chunk.write(argc, line);
            }
            None => self.error_at_current("Zu viele Konstanten in einem Chunk."),
        }
        self.last_base = None;
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Erwartet wurde ')' nach dem Ausdruck.");
    }

    fn array_literal(&mut self) {
        let line = self.previous().line;
        let mut count: u8 = 0;
        let mut elem_type: Option<ValueType> = None;
        if !self.check(TokenKind::RightSquareBracket) {
            loop {
                self.expression();
                match elem_type {
                    None => elem_type = Some(self.last_type),
                    Some(t) if promote(t, self.last_type).is_some() => {}
                    Some(_) => self.error_at_current("Alle Elemente eines Arrays müssen denselben Typ haben."),
                }
                count = count.saturating_add(1);
                if !self.matches(TokenKind::Semicolon) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightSquareBracket, "Erwartet wurde ']' nach den Array-Elementen.");
        self.chunk.write_op(OpCode::BuildArray, line);
        self.chunk.write(count, line);
        self.last_type = elem_type.and_then(|t| t.array_of()).unwrap_or(ValueType::ZahlenArr);
    }

    fn unary_negate(&mut self) {
        let line = self.previous().line;
        self.parse_precedence(Precedence::Unary);
        if !self.last_type.is_numeric() {
            self.error_at_current("Das Minuszeichen erwartet eine Zahl oder Kommazahl.");
        }
        self.chunk.write_op(OpCode::Negate, line);
    }

    fn unary_not(&mut self) {
        let line = self.previous().line;
        self.parse_precedence(Precedence::Unary);
        if self.last_type != ValueType::Boolean {
            self.error_at_current("'nicht' erwartet ein Boolean.");
        }
        self.chunk.write_op(OpCode::Not, line);
        self.last_type = ValueType::Boolean;
    }

    fn unary_betrag(&mut self) {
        let line = self.previous().line;
        self.parse_precedence(Precedence::Unary);
        if !self.last_type.is_numeric() {
            self.error_at_current("'Betrag' erwartet eine Zahl oder Kommazahl.");
        }
        self.chunk.write_op(OpCode::Betrag, line);
    }

    /// `Ln` always computes in double precision at runtime; unlike the
    /// original (whose static type-inference path always echoed the
    /// operand's type, wrongly claiming `Ln` of a `Zahl` statically
    /// remained a `Zahl`), this always types the result `Kommazahl`.
    fn unary_ln(&mut self) {
        let line = self.previous().line;
        self.parse_precedence(Precedence::Unary);
        if !self.last_type.is_numeric() {
            self.error_at_current("'Ln' erwartet eine Zahl oder Kommazahl.");
        }
        self.chunk.write_op(OpCode::Ln, line);
        self.last_type = ValueType::Kommazahl;
    }

    fn binary_arith(&mut self, op: OpCode, word: &str) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(rules::infix_precedence(self.tokens[self.current - 1].kind).next());
        let result = match promote(left_type, self.last_type) {
            Some(t) if t.is_numeric() || t == ValueType::Text => t,
            _ => {
                self.error_at_current(&format!("'{}' erwartet zwei Zahlen oder Kommazahlen.", word));
                left_type
            }
        };
        self.chunk.write_op(op, line);
        self.last_type = result;
    }

    /// Exponentiation is right-associative (`2 hoch 3 hoch 2` == `2^(3^2)`),
    /// a deliberate correction: the original parser reused the same
    /// left-associative `binary()` handler for every binary operator,
    /// including `hoch`, despite the language's own grammar reading as a
    /// right-associative power operator.
    fn binary_exponent(&mut self) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(Precedence::Exponent);
        let result = match promote(left_type, self.last_type) {
            Some(t) if t.is_numeric() => t,
            _ => {
                self.error_at_current("'hoch' erwartet zwei Zahlen oder Kommazahlen.");
                left_type
            }
        };
        self.chunk.write_op(OpCode::Exponent, line);
        self.last_type = result;
    }

    /// `n Wurzel x` (from the scanner's `INUMBER . Wurzel von` fusion): the
    /// `n`th root of `x`. Both operands must be `Zahl`; the result is always
    /// a `Kommazahl`, matching `Vm::unary_wurzel`'s `powf`-based evaluation.
    fn binary_wurzel(&mut self) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(Precedence::Exponent);
        if left_type != ValueType::Zahl || self.last_type != ValueType::Zahl {
            self.error_at_current("'Wurzel' erwartet zwei Zahlen.");
        }
        self.chunk.write_op(OpCode::Wurzel, line);
        self.last_type = ValueType::Kommazahl;
    }

    fn binary_logic(&mut self, op: OpCode) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(rules::infix_precedence(self.tokens[self.current - 1].kind).next());
        if left_type != ValueType::Boolean || self.last_type != ValueType::Boolean {
            self.error_at_current("'und'/'oder' erwarten zwei Booleans.");
        }
        self.chunk.write_op(op, line);
        self.last_type = ValueType::Boolean;
    }

    fn binary_equality(&mut self, op: OpCode) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(rules::infix_precedence(self.tokens[self.current - 1].kind).next());
        if promote(left_type, self.last_type).is_none() && left_type != self.last_type {
            self.error_at_current("'gleich'/'ungleich' erwarten zwei Werte desselben Typs.");
        }
        self.chunk.write_op(op, line);
        self.last_type = ValueType::Boolean;
        self.consume_trailing_copula();
    }

    fn binary_comparison(&mut self, op: OpCode) {
        let left_type = self.last_type;
        let line = self.previous().line;
        self.parse_precedence(rules::infix_precedence(self.tokens[self.current - 1].kind).next());
        if !left_type.is_numeric() || !self.last_type.is_numeric() {
            self.error_at_current("Vergleiche erwarten zwei Zahlen oder Kommazahlen.");
        }
        self.chunk.write_op(op, line);
        self.last_type = ValueType::Boolean;
        self.consume_trailing_copula();
    }

    /// Comparisons and equality tests read naturally with a trailing
    /// copula (`5 größer 3 ist`, `a gleich b ist`), mirroring
    /// `original_source/src/Compiler.cpp`'s `consume(TokenType::IST, ...)`
    /// after every comparison/equality case. Unlike the original, the
    /// copula is optional here rather than required, since a comparison
    /// used as a sub-expression (e.g. as a `für`-loop bound check) has no
    /// natural place to put one.
    fn consume_trailing_copula(&mut self) {
        if !self.matches(TokenKind::Ist) {
            self.matches(TokenKind::Sind);
        }
    }

    /// `<expr> um <n> Bit nach Rechts|Links verschoben`.
    fn shift_expr(&mut self) {
        let left_type = self.last_type;
        let line = self.previous().line;
        if left_type != ValueType::Zahl {
            self.error_at_current("Bit-Verschiebung erwartet eine Zahl.");
        }
        self.parse_precedence(Precedence::Bitshift.next());
        if self.last_type != ValueType::Zahl {
            self.error_at_current("Die Anzahl der Bits muss eine Zahl sein.");
        }
        self.consume(TokenKind::Bit, "Erwartet wurde 'Bit' nach der Anzahl.");
        self.consume(TokenKind::Nach, "Erwartet wurde 'nach' nach 'Bit'.");
        let direction = if self.matches(TokenKind::Rechts) {
            OpCode::ShiftRight
        } else {
            self.consume(TokenKind::Links, "Erwartet wurde 'rechts' oder 'links'.");
            OpCode::ShiftLeft
        };
        self.consume(TokenKind::Verschoben, "Erwartet wurde 'verschoben' am Ende der Bit-Verschiebung.");
        self.chunk.write_op(direction, line);
        self.last_type = ValueType::Zahl;
    }

    /// `<array-expr> an der Stelle <index-expr>` (already fused to a single
    /// `An` token by the scanner's rewrite pass). Followed by `ist`/`sind
    /// <value-expr>` this rewrites a single element in place: the element is
    /// set on the array value already sitting on the stack and the mutated
    /// array is written back through the base variable the array came from.
    fn index_expr(&mut self, can_assign: bool) {
        let array_type = self.last_type;
        let array_base = self.last_base;
        let line = self.previous().line;
        let element_type = array_type.element_type();
        if element_type.is_none() {
            self.error_at_current("'an der Stelle' erwartet ein Array auf der linken Seite.");
        }
        self.parse_precedence(Precedence::Indexing.next());
        if self.last_type != ValueType::Zahl {
            self.error_at_current("Der Index muss eine Zahl sein.");
        }

        if can_assign && (self.check(TokenKind::Ist) || self.check(TokenKind::Sind)) {
            self.advance();
            self.expression();
            if let Some(elem_ty) = element_type {
                if promote(elem_ty, self.last_type).is_none() && elem_ty != self.last_type {
                    self.error_at_current(&format!(
                        "Erwartet wurde ein Element vom Typ {}, gefunden wurde {}.",
                        elem_ty, self.last_type
                    ));
                }
            }
            self.chunk.write_op(OpCode::SetIndex, line);
            match array_base {
                Some(base) => self.emit_set(&base, line),
                None => self.error_at_current("Ungültiges Ziel für eine Zuweisung an ein Array-Element."),
            }
            self.last_type = array_type;
            self.last_base = None;
            return;
        }

        self.chunk.write_op(OpCode::GetIndex, line);
        self.last_type = element_type.unwrap_or(ValueType::None);
        self.last_base = None;
    }

    fn emit_constant(&mut self, value: Value) {
        let line = self.previous().line;
        match self.chunk.add_constant(value) {
            Some(idx) => {
                self.chunk.write_op(OpCode::Constant, line);
                self.chunk.write(idx, line);
            }
            None => self.error_at_current("Zu viele Konstanten in einem Chunk."),
        }
    }
}

fn type_kind_to_value_type(kind: TokenKind) -> Option<ValueType> {
    match kind {
        TokenKind::Zahl => Some(ValueType::Zahl),
        TokenKind::Kommazahl => Some(ValueType::Kommazahl),
        TokenKind::Boolean => Some(ValueType::Boolean),
        TokenKind::Buchstabe => Some(ValueType::Buchstabe),
        TokenKind::Text => Some(ValueType::Text),
        TokenKind::Zahlen => Some(ValueType::ZahlenArr),
        TokenKind::Kommazahlen => Some(ValueType::KommazahlenArr),
        TokenKind::Booleans => Some(ValueType::BooleanArr),
        TokenKind::Buchstaben => Some(ValueType::BuchstabenArr),
        TokenKind::Texte => Some(ValueType::TexteArr),
        _ => None,
    }
}

pub fn compile(tokens: Vec<Token>, interner: &Interner) -> Result<Chunk, Vec<CompileError>> {
    Compiler::new(tokens, interner).compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn compile_source(src: &str) -> Result<Chunk, Vec<CompileError>> {
        let mut interner = Interner::new();
        let scanner = Scanner::new(src, "test.ddp", &mut interner);
        let (tokens, lex_errors) = scanner.scan();
        assert!(lex_errors.is_empty(), "unexpected lex errors: {:?}", lex_errors);
        compile(tokens, &interner)
    }

    #[test]
    fn compiles_a_number_declaration() {
        let chunk = compile_source("die Zahl x ist 5.\n").expect("should compile");
        assert!(chunk.constants.iter().any(|v| matches!(v, Value::Int(5))));
    }

    #[test]
    fn rejects_der_with_zahl() {
        let result = compile_source("der Zahl x ist 5.\n");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_das_zeichen() {
        let result = compile_source("das Buchstabe x ist 'a'.\n");
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_undeclared_variable() {
        let result = compile_source("schreibe(x).\n");
        assert!(result.is_err());
    }

    #[test]
    fn if_statement_emits_jumps() {
        let chunk = compile_source("wenn wahr dann:\n    die Zahl x ist 1.\n").expect("should compile");
        assert!(chunk.code.contains(&(OpCode::JumpIfFalse as u8)));
    }

    #[test]
    fn for_loop_emits_for_prep_and_for_test() {
        let chunk =
            compile_source("für jede Zahl i von 1 bis 10 mache:\n    die Zahl x ist i.\n").expect("should compile");
        assert!(chunk.code.contains(&(OpCode::ForPrep as u8)));
        assert!(chunk.code.contains(&(OpCode::ForTest as u8)));
    }

    #[test]
    fn reassigning_a_declared_variable_emits_set_global() {
        let chunk = compile_source("die Zahl n ist 10.\nn ist n plus 1.\n").expect("should compile");
        assert!(chunk.code.contains(&(OpCode::SetGlobal as u8)));
    }

    #[test]
    fn reassigning_an_undeclared_variable_is_an_error() {
        let result = compile_source("n ist 1.\n");
        assert!(result.is_err());
    }

    #[test]
    fn assigning_a_scalar_with_sind_is_an_error() {
        let result = compile_source("die Zahl n ist 10.\nn sind 1.\n");
        assert!(result.is_err());
    }

    #[test]
    fn indexed_assignment_emits_set_index_and_writes_back() {
        let chunk = compile_source("die Zahlen a sind [1; 2; 3].\na an der Stelle 1 ist 9.\n")
            .expect("should compile");
        assert!(chunk.code.contains(&(OpCode::SetIndex as u8)));
        assert!(chunk.code.contains(&(OpCode::SetGlobal as u8)));
    }

    #[test]
    fn native_call_emits_call_opcode() {
        let chunk = compile_source("schreibeZeile(\"hallo\").\n").expect("should compile");
        assert!(chunk.code.contains(&(OpCode::Call as u8)));
    }

    #[test]
    fn native_call_checks_argument_count() {
        let result = compile_source("schreibe().\n");
        assert!(result.is_err());
    }

    #[test]
    fn native_call_checks_return_type_for_subsequent_use() {
        let chunk = compile_source("die Zahl n ist zuZahl(\"5\").\n").expect("should compile");
        assert!(chunk.code.contains(&(OpCode::Call as u8)));
    }

    #[test]
    fn unknown_native_is_a_compile_error() {
        let result = compile_source("nichtVorhanden(1).\n");
        assert!(result.is_err());
    }
}
