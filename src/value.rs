use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the CLI's `-ascii` flag before a program runs. When set,
/// [`Value::char_to_string`] degrades to a lossy single-byte-per-character
/// rendering instead of treating the 16-bit code unit as a UTF-8 pair;
/// meant for terminals that can't render the interpreter's default output.
static ASCII_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_ascii_mode(on: bool) {
    ASCII_MODE.store(on, Ordering::Relaxed);
}

fn ascii_mode() -> bool {
    ASCII_MODE.load(Ordering::Relaxed)
}

/// The static type of a value, known at compile time for every expression.
/// `#[repr(u8)]` lets `ArrayOfSize` encode the element type as a single
/// operand byte in the bytecode stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    None,
    Zahl,
    Kommazahl,
    Boolean,
    Buchstabe,
    Text,
    ZahlenArr,
    KommazahlenArr,
    BooleanArr,
    BuchstabenArr,
    TexteArr,
}

impl ValueType {
    /// Inverse of the `as u8` cast used when emitting an `ArrayOfSize`
    /// operand. Only ever reads bytes the compiler itself wrote.
    pub fn from_u8(byte: u8) -> Option<ValueType> {
        const TABLE: [ValueType; 11] = [
            ValueType::None,
            ValueType::Zahl,
            ValueType::Kommazahl,
            ValueType::Boolean,
            ValueType::Buchstabe,
            ValueType::Text,
            ValueType::ZahlenArr,
            ValueType::KommazahlenArr,
            ValueType::BooleanArr,
            ValueType::BuchstabenArr,
            ValueType::TexteArr,
        ];
        TABLE.get(byte as usize).copied()
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            ValueType::ZahlenArr
                | ValueType::KommazahlenArr
                | ValueType::BooleanArr
                | ValueType::BuchstabenArr
                | ValueType::TexteArr
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Zahl | ValueType::Kommazahl)
    }

    pub fn element_type(self) -> Option<ValueType> {
        match self {
            ValueType::ZahlenArr => Some(ValueType::Zahl),
            ValueType::KommazahlenArr => Some(ValueType::Kommazahl),
            ValueType::BooleanArr => Some(ValueType::Boolean),
            ValueType::BuchstabenArr => Some(ValueType::Buchstabe),
            ValueType::TexteArr => Some(ValueType::Text),
            _ => None,
        }
    }

    pub fn array_of(self) -> Option<ValueType> {
        match self {
            ValueType::Zahl => Some(ValueType::ZahlenArr),
            ValueType::Kommazahl => Some(ValueType::KommazahlenArr),
            ValueType::Boolean => Some(ValueType::BooleanArr),
            ValueType::Buchstabe => Some(ValueType::BuchstabenArr),
            ValueType::Text => Some(ValueType::TexteArr),
            _ => None,
        }
    }
}

/// Builds a zero-initialized array of `len` elements of `element_type`, for
/// `OpCode::ArrayOfSize`'s `die Zahlen xs sind 5 Stück.` allocation form.
pub fn zero_array(element_type: ValueType, len: usize) -> Option<Value> {
    match element_type {
        ValueType::Zahl => Some(Value::IntArr(vec![0; len])),
        ValueType::Kommazahl => Some(Value::DoubleArr(vec![0.0; len])),
        ValueType::Boolean => Some(Value::BoolArr(vec![false; len])),
        ValueType::Buchstabe => Some(Value::CharArr(vec![0; len])),
        ValueType::Text => Some(Value::StringArr(vec![String::new(); len])),
        _ => None,
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::None => "nichts",
            ValueType::Zahl => "Zahl",
            ValueType::Kommazahl => "Kommazahl",
            ValueType::Boolean => "Boolean",
            ValueType::Buchstabe => "Buchstabe",
            ValueType::Text => "Text",
            ValueType::ZahlenArr => "Zahlen",
            ValueType::KommazahlenArr => "Kommazahlen",
            ValueType::BooleanArr => "Booleans",
            ValueType::BuchstabenArr => "Buchstaben",
            ValueType::TexteArr => "Texte",
        };
        f.write_str(name)
    }
}

/// A runtime value. Char is kept as a 16-bit code unit, matching the
/// original's `short`-backed character representation; printing re-encodes
/// it to the one or two UTF-8 bytes it denotes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Int(i32),
    Double(f64),
    Bool(bool),
    Char(u16),
    String(String),
    IntArr(Vec<i32>),
    DoubleArr(Vec<f64>),
    BoolArr(Vec<bool>),
    CharArr(Vec<u16>),
    StringArr(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Int(_) => ValueType::Zahl,
            Value::Double(_) => ValueType::Kommazahl,
            Value::Bool(_) => ValueType::Boolean,
            Value::Char(_) => ValueType::Buchstabe,
            Value::String(_) => ValueType::Text,
            Value::IntArr(_) => ValueType::ZahlenArr,
            Value::DoubleArr(_) => ValueType::KommazahlenArr,
            Value::BoolArr(_) => ValueType::BooleanArr,
            Value::CharArr(_) => ValueType::BuchstabenArr,
            Value::StringArr(_) => ValueType::TexteArr,
        }
    }

    /// Re-encodes a 16-bit character code back into the UTF-8 bytes it
    /// represents. ASCII and C0 control codes pass through as a single byte;
    /// anything else is split into the high/low byte of a two-byte sequence,
    /// mirroring `Value::U8CharToString` in the original runtime.
    pub fn char_to_string(ch: u16) -> String {
        if ch < 0x80 || ascii_mode() {
            (ch as u8 as char).to_string()
        } else {
            let high = (ch >> 8) as u8;
            let low = (ch & 0xFF) as u8;
            let bytes = [high, low];
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "nichts"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", format_double(*d)),
            Value::Bool(b) => write!(f, "{}", if *b { "wahr" } else { "falsch" }),
            Value::Char(c) => write!(f, "{}", Value::char_to_string(*c)),
            Value::String(s) => write!(f, "{}", s),
            Value::IntArr(a) => write_array(f, a.iter().map(|n| n.to_string())),
            Value::DoubleArr(a) => write_array(f, a.iter().map(|d| format_double(*d))),
            Value::BoolArr(a) => {
                write_array(f, a.iter().map(|b| if *b { "wahr".to_string() } else { "falsch".to_string() }))
            }
            Value::CharArr(a) => {
                write_array(f, a.iter().map(|c| format!("'{}'", Value::char_to_string(*c))))
            }
            Value::StringArr(a) => write_array(f, a.iter().map(|s| format!("\"{}\"", s))),
        }
    }
}

/// Formats a double the way the original prints numbers: the default
/// `to_string` rendering, with the decimal point swapped for a comma.
fn format_double(d: f64) -> String {
    let s = if d.fract() == 0.0 && d.is_finite() {
        format!("{:.6}", d)
    } else {
        d.to_string()
    };
    s.replace('.', ",")
}

fn write_array(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    let joined: Vec<String> = items.collect();
    if joined.is_empty() {
        write!(f, "[]")
    } else {
        write!(f, "[{}]", joined.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_int_is_plain() {
        assert_eq!(Value::Int(42).to_string(), "42");
    }

    #[test]
    fn display_bool_uses_german_words() {
        assert_eq!(Value::Bool(true).to_string(), "wahr");
        assert_eq!(Value::Bool(false).to_string(), "falsch");
    }

    #[test]
    fn display_double_uses_comma_separator() {
        assert_eq!(Value::Double(3.5).to_string(), "3,5");
    }

    #[test]
    fn display_empty_array_is_brackets() {
        assert_eq!(Value::IntArr(vec![]).to_string(), "[]");
    }

    #[test]
    fn display_int_array_joins_with_semicolons() {
        assert_eq!(Value::IntArr(vec![1, 2, 3]).to_string(), "[1; 2; 3]");
    }

    #[test]
    fn display_string_array_quotes_each_element() {
        assert_eq!(
            Value::StringArr(vec!["a".into(), "b".into()]).to_string(),
            "[\"a\"; \"b\"]"
        );
    }

    #[test]
    fn display_char_array_quotes_with_single_quotes() {
        assert_eq!(Value::CharArr(vec![b'x' as u16]).to_string(), "['x']");
    }

    #[test]
    fn char_to_string_passes_ascii_through_as_one_byte() {
        assert_eq!(Value::char_to_string(b'A' as u16), "A");
    }

    #[test]
    fn value_type_reports_zahl_for_int() {
        assert_eq!(Value::Int(1).value_type(), ValueType::Zahl);
    }

    #[test]
    fn array_of_and_element_type_are_inverses() {
        let arr = ValueType::Zahl.array_of().unwrap();
        assert_eq!(arr, ValueType::ZahlenArr);
        assert_eq!(arr.element_type().unwrap(), ValueType::Zahl);
    }

    #[test]
    fn value_type_byte_roundtrips() {
        assert_eq!(ValueType::from_u8(ValueType::Text as u8), Some(ValueType::Text));
    }

    #[test]
    fn zero_array_builds_the_right_variant() {
        assert_eq!(zero_array(ValueType::Zahl, 3), Some(Value::IntArr(vec![0, 0, 0])));
        assert_eq!(zero_array(ValueType::Boolean, 0), Some(Value::BoolArr(vec![])));
    }
}
