use crate::chunk::{Chunk, OpCode};
use crate::error::RuntimeError;
use crate::intern::{Interner, Symbol};
use crate::natives::NativeRegistry;
use crate::value::Value;
use std::collections::HashMap;
use std::io::Write;

/// 64 call frames of 256 stack slots each, matching the original VM's fixed
/// stack budget; user code never defines its own functions in this crate
/// (see Non-goals), so in practice only the top-level frame is ever used,
/// but the bound is kept for fidelity and as a real guard against runaway
/// recursion inside natives.
pub const STACK_MAX: usize = 64 * 256;

#[derive(Default)]
struct ForDirectionCache {
    cache: HashMap<usize, bool>,
}

impl ForDirectionCache {
    /// Returns whether this `für` loop counts downward (`start > end`),
    /// deciding and remembering the answer the first time a given
    /// instruction offset is reached.
    fn descending(&mut self, offset: usize, start: i32, end: i32) -> bool {
        *self.cache.entry(offset).or_insert(start > end)
    }
}

pub struct Vm<'a> {
    chunk: &'a Chunk,
    ip: usize,
    stack: Vec<Value>,
    globals: HashMap<Symbol, Value>,
    interner: &'a mut Interner,
    natives: &'a NativeRegistry,
    for_prep: bool,
    for_directions: ForDirectionCache,
    stdout: &'a mut dyn Write,
}

impl<'a> Vm<'a> {
    pub fn new(
        chunk: &'a Chunk,
        interner: &'a mut Interner,
        natives: &'a NativeRegistry,
        stdout: &'a mut dyn Write,
    ) -> Self {
        Vm {
            chunk,
            ip: 0,
            stack: Vec::with_capacity(256),
            globals: HashMap::new(),
            interner,
            natives,
            for_prep: false,
            for_directions: ForDirectionCache::default(),
            stdout,
        }
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let op = self.read_op()?;
            match op {
                OpCode::Constant => {
                    let idx = self.read_byte()?;
                    let value = self.chunk.constants[idx as usize].clone();
                    self.push(value)?;
                }
                OpCode::None => self.push(Value::None)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let value = self.stack[slot].clone();
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    self.stack[slot] = self.peek(0).clone();
                }
                OpCode::DefineLocal => {
                    // the value is already sitting on the stack where the
                    // new local's slot will be; nothing further to do.
                }
                OpCode::GetGlobal => {
                    let name = self.read_global_name()?;
                    match self.globals.get(&name) {
                        Some(v) => {
                            let v = v.clone();
                            self.push(v)?;
                        }
                        None => return Err(self.error(format!(
                            "Die Variable '{}' ist nicht definiert!",
                            self.interner.resolve(name)
                        ))),
                    }
                }
                OpCode::SetGlobal => {
                    let name = self.read_global_name()?;
                    let value = self.peek(0).clone();
                    self.globals.insert(name, value);
                }
                OpCode::DefineGlobal => {
                    let name = self.read_global_name()?;
                    let value = self.pop();
                    self.globals.insert(name, value);
                }

                OpCode::Add => self.binary_numeric_or_concat(|a, b| a + b, |a, b| a + b)?,
                OpCode::Subtract => self.binary_numeric(|a, b| a - b, |a, b| a - b)?,
                OpCode::Multiply => self.binary_numeric(|a, b| a * b, |a, b| a * b)?,
                OpCode::Divide => self.binary_divide()?,
                OpCode::Modulo => self.binary_modulo()?,
                OpCode::Exponent => self.binary_exponent()?,
                OpCode::Wurzel => self.unary_wurzel()?,
                OpCode::Ln => self.unary_ln()?,
                OpCode::Betrag => self.unary_betrag()?,
                OpCode::Negate => self.unary_negate()?,

                OpCode::Greater => self.binary_compare(|o| o == std::cmp::Ordering::Greater)?,
                OpCode::GreaterEqual => self.binary_compare(|o| o != std::cmp::Ordering::Less)?,
                OpCode::Less => self.binary_compare(|o| o == std::cmp::Ordering::Less)?,
                OpCode::LessEqual => self.binary_compare(|o| o != std::cmp::Ordering::Greater)?,
                OpCode::ForTest => self.for_test()?,
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(values_equal(&a, &b)))?;
                }
                OpCode::NotEqual => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(!values_equal(&a, &b)))?;
                }

                OpCode::And => {
                    let b = self.pop_bool()?;
                    let a = self.pop_bool()?;
                    self.push(Value::Bool(a && b))?;
                }
                OpCode::Or => {
                    let b = self.pop_bool()?;
                    let a = self.pop_bool()?;
                    self.push(Value::Bool(a || b))?;
                }
                OpCode::Not => {
                    let a = self.pop_bool()?;
                    self.push(Value::Bool(!a))?;
                }

                OpCode::ShiftLeft => self.binary_shift(|a, n| a.wrapping_shl(n))?,
                OpCode::ShiftRight => self.binary_shift(|a, n| a.wrapping_shr(n))?,

                OpCode::BuildArray => {
                    let count = self.read_byte()? as usize;
                    self.build_array(count)?;
                }
                OpCode::GetIndex => self.get_index()?,
                OpCode::SetIndex => self.set_index()?,

                OpCode::Jump => {
                    let offset = self.read_u16()?;
                    self.ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()?;
                    if !self.peek_bool(0)? {
                        self.ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()?;
                    self.ip -= offset as usize;
                }
                OpCode::ForPrep => self.for_prep = true,
                OpCode::ForDone => self.for_prep = false,

                OpCode::Call => self.call_native()?,
                OpCode::Return => return Ok(()),
                OpCode::Print => {
                    let v = self.pop();
                    let _ = write!(self.stdout, "{}", v);
                }
            }
        }
    }

    // -- stack helpers --------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::stack_overflow(self.current_line()));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: compiler emitted unbalanced bytecode")
    }

    fn peek(&self, back: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - back]
    }

    fn pop_bool(&mut self) -> Result<bool, RuntimeError> {
        match self.pop() {
            Value::Bool(b) => Ok(b),
            other => Err(self.error(format!("Erwartet wurde ein Boolean, aber gefunden wurde {}.", other.value_type()))),
        }
    }

    fn peek_bool(&self, back: usize) -> Result<bool, RuntimeError> {
        match self.peek(back) {
            Value::Bool(b) => Ok(*b),
            other => Err(self.error(format!("Erwartet wurde ein Boolean, aber gefunden wurde {}.", other.value_type()))),
        }
    }

    fn current_line(&self) -> u32 {
        self.chunk.line_at(self.ip.saturating_sub(1))
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(message, self.current_line())
    }

    // -- bytecode reading -------------------------------------------------

    fn read_byte(&mut self) -> Result<u8, RuntimeError> {
        let b = *self
            .chunk
            .code
            .get(self.ip)
            .ok_or_else(|| RuntimeError::new("Unerwartetes Ende des Bytecodes.", self.current_line()))?;
        self.ip += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        let hi = self.read_byte()? as u16;
        let lo = self.read_byte()? as u16;
        Ok((hi << 8) | lo)
    }

    fn read_op(&mut self) -> Result<OpCode, RuntimeError> {
        let byte = self.read_byte()?;
        OpCode::from_u8(byte).ok_or_else(|| self.error("Unbekannter Opcode."))
    }

    fn read_global_name(&mut self) -> Result<Symbol, RuntimeError> {
        let idx = self.read_byte()?;
        match &self.chunk.constants[idx as usize] {
            Value::String(s) => Ok(self.interner.intern(s)),
            other => Err(self.error(format!("Erwartet wurde ein Variablenname, gefunden wurde {:?}.", other))),
        }
    }

    // -- arithmetic ---------------------------------------------------------

    fn binary_numeric(&mut self, int_op: fn(i32, i32) -> i32, float_op: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        let result = numeric_pair(&a, &b, int_op, float_op).ok_or_else(|| {
            self.error(format!(
                "Arithmetik erwartet zwei Zahlen oder Kommazahlen, gefunden: {} und {}.",
                a.value_type(),
                b.value_type()
            ))
        })?;
        self.push(result)
    }

    fn binary_numeric_or_concat(&mut self, int_op: fn(i32, i32) -> i32, float_op: fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        if let (Value::String(sa), Value::String(sb)) = (&a, &b) {
            return self.push(Value::String(format!("{}{}", sa, sb)));
        }
        let result = numeric_pair(&a, &b, int_op, float_op).ok_or_else(|| {
            self.error(format!(
                "'+' erwartet zwei Zahlen, zwei Kommazahlen oder zwei Texte, gefunden: {} und {}.",
                a.value_type(),
                b.value_type()
            ))
        })?;
        self.push(result)
    }

    fn binary_divide(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    return Err(self.error("Division durch Null ist nicht erlaubt!"));
                }
                self.push(Value::Int(x / y))
            }
            _ => {
                let (x, y) = as_f64_pair(&a, &b).ok_or_else(|| {
                    self.error(format!("'durch' erwartet zwei Zahlen oder Kommazahlen, gefunden: {} und {}.", a.value_type(), b.value_type()))
                })?;
                if y == 0.0 {
                    return Err(self.error("Division durch Null ist nicht erlaubt!"));
                }
                self.push(Value::Double(x / y))
            }
        }
    }

    fn binary_modulo(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    return Err(self.error("Division durch Null ist nicht erlaubt!"));
                }
                self.push(Value::Int(x % y))
            }
            _ => Err(self.error(format!("'modulo' erwartet zwei Zahlen, gefunden: {} und {}.", a.value_type(), b.value_type()))),
        }
    }

    fn binary_exponent(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Int(x), Value::Int(y)) if *y >= 0 => self.push(Value::Int(x.pow(*y as u32))),
            _ => {
                let (x, y) = as_f64_pair(&a, &b).ok_or_else(|| {
                    self.error(format!("'hoch' erwartet zwei Zahlen oder Kommazahlen, gefunden: {} und {}.", a.value_type(), b.value_type()))
                })?;
                self.push(Value::Double(x.powf(y)))
            }
        }
    }

    /// `n Wurzel x`: the `n` operand (always an integer, from the scanner's
    /// `INUMBER Wurzel` fusion) sits below `x` on the stack.
    fn unary_wurzel(&mut self) -> Result<(), RuntimeError> {
        let x = self.pop();
        let n = self.pop();
        let (n, x) = match (&n, as_f64(&x)) {
            (Value::Int(n), Some(x)) => (*n as f64, x),
            _ => return Err(self.error("'Wurzel' erwartet eine Zahl als Grad und eine Zahl oder Kommazahl als Radikand.")),
        };
        self.push(Value::Double(x.powf(1.0 / n)))
    }

    fn unary_ln(&mut self) -> Result<(), RuntimeError> {
        let a = self.pop();
        let x = as_f64(&a).ok_or_else(|| self.error(format!("'Ln' erwartet eine Zahl oder Kommazahl, gefunden: {}.", a.value_type())))?;
        self.push(Value::Double(x.ln()))
    }

    fn unary_betrag(&mut self) -> Result<(), RuntimeError> {
        match self.pop() {
            Value::Int(n) => self.push(Value::Int(n.abs())),
            Value::Double(d) => self.push(Value::Double(d.abs())),
            other => Err(self.error(format!("'Betrag' erwartet eine Zahl oder Kommazahl, gefunden: {}.", other.value_type()))),
        }
    }

    fn unary_negate(&mut self) -> Result<(), RuntimeError> {
        match self.pop() {
            Value::Int(n) => self.push(Value::Int(-n)),
            Value::Double(d) => self.push(Value::Double(-d)),
            other => Err(self.error(format!("Das Minuszeichen erwartet eine Zahl oder Kommazahl, gefunden: {}.", other.value_type()))),
        }
    }

    fn binary_compare(&mut self, matches_ordering: fn(std::cmp::Ordering) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        let ord = compare_numeric(&a, &b).ok_or_else(|| {
            self.error(format!("Vergleiche erwarten zwei Zahlen oder Kommazahlen, gefunden: {} und {}.", a.value_type(), b.value_type()))
        })?;
        self.push(Value::Bool(matches_ordering(ord)))
    }

    /// Non-self-modifying replacement for the original's in-place
    /// `GREATER`-to-`LESS` opcode rewrite inside `für` loop tests: decide
    /// the loop's direction once per instruction offset and reuse it.
    fn for_test(&mut self) -> Result<(), RuntimeError> {
        let end = self.pop();
        let start = self.pop();
        let offset = self.ip - 1;
        let (a, b) = match (&start, &end) {
            (Value::Int(a), Value::Int(b)) => (*a, *b),
            _ => return Err(self.error("für-Schleifengrenzen müssen Zahlen sein.")),
        };
        let descending = self.for_directions.descending(offset, a, b);
        let result = if descending { a > b } else { a < b };
        self.push(Value::Bool(result))
    }

    fn binary_shift(&mut self, op: fn(i32, u32) -> i32) -> Result<(), RuntimeError> {
        let n = self.pop();
        let x = self.pop();
        match (&x, &n) {
            (Value::Int(x), Value::Int(n)) => self.push(Value::Int(op(*x, *n as u32))),
            _ => Err(self.error("Bit-Verschiebung erwartet zwei Zahlen.")),
        }
    }

    fn build_array(&mut self, count: usize) -> Result<(), RuntimeError> {
        let start = self.stack.len() - count;
        let elems: Vec<Value> = self.stack.split_off(start);
        let array = match elems.first() {
            Some(Value::Int(_)) => Value::IntArr(elems.into_iter().map(|v| as_i32(&v).unwrap_or(0)).collect()),
            Some(Value::Double(_)) => Value::DoubleArr(elems.into_iter().filter_map(|v| as_f64(&v)).collect()),
            Some(Value::Bool(_)) => Value::BoolArr(
                elems.into_iter().map(|v| matches!(v, Value::Bool(true))).collect(),
            ),
            Some(Value::Char(_)) => Value::CharArr(
                elems
                    .into_iter()
                    .map(|v| if let Value::Char(c) = v { c } else { 0 })
                    .collect(),
            ),
            Some(Value::String(_)) => Value::StringArr(
                elems
                    .into_iter()
                    .map(|v| if let Value::String(s) = v { s } else { String::new() })
                    .collect(),
            ),
            _ => Value::IntArr(Vec::new()),
        };
        self.push(array)
    }

    fn get_index(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop();
        let array = self.pop();
        let i = as_i32(&index).ok_or_else(|| self.error("Der Index muss eine Zahl sein."))?;
        let line = self.current_line();
        let value = index_into(&array, i).ok_or_else(|| {
            RuntimeError::new(format!("Index {} liegt außerhalb des Arrays!", i), line)
        })?;
        self.push(value)
    }

    fn set_index(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let index = self.pop();
        let mut array = self.pop();
        let i = as_i32(&index).ok_or_else(|| self.error("Der Index muss eine Zahl sein."))? as usize;
        if i == 0 {
            return Err(self.error("Indizes beginnen bei 1, nicht bei 0!"));
        }
        let i = i - 1;
        match (&mut array, &value) {
            (Value::IntArr(a), Value::Int(v)) if i < a.len() => a[i] = *v,
            (Value::DoubleArr(a), Value::Double(v)) if i < a.len() => a[i] = *v,
            (Value::BoolArr(a), Value::Bool(v)) if i < a.len() => a[i] = *v,
            (Value::CharArr(a), Value::Char(v)) if i < a.len() => a[i] = *v,
            (Value::StringArr(a), Value::String(v)) if i < a.len() => a[i] = v.clone(),
            _ => return Err(self.error("Ungültiger Zugriff beim Schreiben in ein Array!")),
        }
        self.push(array)
    }

    fn call_native(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_global_name()?;
        let argc = self.read_byte()? as usize;
        let start = self.stack.len() - argc;
        let args: Vec<Value> = self.stack.split_off(start);
        let name_str = self.interner.resolve(name).to_string();
        let line = self.current_line();
        let result = self
            .natives
            .call(&name_str, &args)
            .map_err(|msg| RuntimeError::new(msg, line))?;
        self.push(result)
    }
}

fn numeric_pair(a: &Value, b: &Value, int_op: fn(i32, i32) -> i32, float_op: fn(f64, f64) -> f64) -> Option<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(Value::Int(int_op(*x, *y))),
        _ => {
            let x = as_f64(a)?;
            let y = as_f64(b)?;
            Some(Value::Double(float_op(x, y)))
        }
    }
}

fn as_f64_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((as_f64(a)?, as_f64(b)?))
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Double(d) => Some(*d),
        _ => None,
    }
}

fn as_i32(v: &Value) -> Option<i32> {
    match v {
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

fn compare_numeric(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    let x = as_f64(a)?;
    let y = as_f64(b)?;
    x.partial_cmp(&y)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            as_f64(a) == as_f64(b)
        }
        _ => a == b,
    }
}

/// 1-indexed element access, matching the language's user-facing indexing.
fn index_into(array: &Value, index: i32) -> Option<Value> {
    if index < 1 {
        return None;
    }
    let i = (index - 1) as usize;
    match array {
        Value::IntArr(a) => a.get(i).map(|v| Value::Int(*v)),
        Value::DoubleArr(a) => a.get(i).map(|v| Value::Double(*v)),
        Value::BoolArr(a) => a.get(i).map(|v| Value::Bool(*v)),
        Value::CharArr(a) => a.get(i).map(|v| Value::Char(*v)),
        Value::StringArr(a) => a.get(i).cloned().map(Value::String),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;
    use crate::natives::NativeRegistry;
    use crate::scanner::Scanner;

    fn run_source(src: &str) -> (Result<(), RuntimeError>, String) {
        let mut interner = Interner::new();
        let scanner = Scanner::new(src, "test.ddp", &mut interner);
        let (tokens, lex_errors) = scanner.scan();
        assert!(lex_errors.is_empty());
        let chunk = compiler::compile(tokens, &interner).expect("should compile");
        let natives = NativeRegistry::new();
        let mut out = Vec::new();
        let result = {
            let mut vm = Vm::new(&chunk, &mut interner, &natives, &mut out);
            vm.run()
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn runs_a_declaration_without_error() {
        let (result, _) = run_source("die Zahl x ist 5.\n");
        assert!(result.is_ok());
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (result, _) = run_source("die Zahl x ist 1 durch 0.\n");
        assert!(result.is_err());
    }

    #[test]
    fn ascending_for_loop_counts_the_right_number_of_times() {
        let (result, _) = run_source(
            "die Zahl n ist 0.\nfür jede Zahl i von 1 bis 3 mache:\n    n ist n.\n",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn for_direction_cache_remembers_descending_loops() {
        let mut cache = ForDirectionCache::default();
        assert!(cache.descending(10, 5, 1));
        assert!(cache.descending(10, 999, 1));
    }

    #[test]
    fn array_index_is_one_based() {
        let array = Value::IntArr(vec![10, 20, 30]);
        assert_eq!(index_into(&array, 1), Some(Value::Int(10)));
        assert_eq!(index_into(&array, 3), Some(Value::Int(30)));
        assert_eq!(index_into(&array, 0), None);
    }
}
