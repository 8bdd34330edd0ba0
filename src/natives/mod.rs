//! Registry and signature table for the interpreter's built-in (native)
//! functions. The compiler consults [`lookup_signature`] to type-check call
//! sites and pick a static return type; the VM consults [`NativeRegistry`]
//! at `CALL` time to dispatch to the actual handler.
//!
//! Grounded in `original_source/src/Natives.cpp`'s free functions, one per
//! native, each taking the popped argument vector and returning a `Value`
//! or throwing a `runtime_error`. This crate keeps the same one-native,
//! one-function shape but returns `Result<Value, String>` instead of
//! throwing, since idiomatic Rust propagates failure through `Result`.

mod io;
mod numeric;
mod text;
mod time;

use crate::value::{Value, ValueType};
use std::collections::HashMap;

pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

/// The static shape a native's parameter may take. Several natives
/// (`Spalten`, `Ersetzen`, `Enthält`, ...) accept either a `Buchstabe` or a
/// `Text` wherever the original took a delimiter/needle, since the C++
/// source dispatches on `args.at(n).Type()` for those positions rather than
/// demanding one fixed type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Accepts a value of any type (`schreibe`'s single argument, etc.).
    Any,
    Exact(ValueType),
    /// `Zahl` or `Kommazahl`.
    Numeric,
    /// `Text` or `Buchstabe`.
    TextLike,
}

impl ParamKind {
    pub fn accepts(self, actual: ValueType) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::Exact(expected) => expected == actual,
            ParamKind::Numeric => actual.is_numeric(),
            ParamKind::TextLike => matches!(actual, ValueType::Text | ValueType::Buchstabe),
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamKind::Any => write!(f, "einen beliebigen Wert"),
            ParamKind::Exact(t) => write!(f, "{}", t),
            ParamKind::Numeric => write!(f, "eine Zahl oder Kommazahl"),
            ParamKind::TextLike => write!(f, "einen Text oder Buchstaben"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NativeSignature {
    pub params: Vec<ParamKind>,
    pub return_type: ValueType,
}

impl NativeSignature {
    fn new(params: Vec<ParamKind>, return_type: ValueType) -> Self {
        NativeSignature { params, return_type }
    }
}

/// Returns the static signature (declared param kinds and return type) of a
/// built-in, by name, or `None` if no such native exists. Used by the
/// compiler while parsing a call expression; the VM never consults this
/// directly.
pub fn lookup_signature(name: &str) -> Option<NativeSignature> {
    use ParamKind::{Any, Exact, Numeric, TextLike};
    use ValueType::{Boolean, Buchstabe, Kommazahl, Text, TexteArr, Zahl, ZahlenArr};
    let none = ValueType::None;
    let sig = match name {
        "schreibe" => NativeSignature::new(vec![Any], none),
        "schreibeZeile" => NativeSignature::new(vec![Any], none),
        "lese" => NativeSignature::new(vec![], Buchstabe),
        "leseZeile" => NativeSignature::new(vec![], Text),

        "existiertDatei" => NativeSignature::new(vec![Exact(Text)], Boolean),
        "leseDatei" => NativeSignature::new(vec![Exact(Text)], Text),
        "schreibeDatei" => NativeSignature::new(vec![Exact(Text), Exact(Text)], none),
        "bearbeiteDatei" => NativeSignature::new(vec![Exact(Text), Exact(Text)], none),
        "leseBytes" => NativeSignature::new(vec![Exact(Text)], ZahlenArr),
        "schreibeBytes" => NativeSignature::new(vec![Exact(Text), Exact(ZahlenArr)], none),
        "bearbeiteBytes" => NativeSignature::new(vec![Exact(Text), Exact(ZahlenArr)], none),

        "clock" => NativeSignature::new(vec![], Kommazahl),
        "warte" => NativeSignature::new(vec![Numeric], none),

        "zuZahl" => NativeSignature::new(vec![Any], Zahl),
        "zuKommazahl" => NativeSignature::new(vec![Any], Kommazahl),
        "zuBoolean" => NativeSignature::new(vec![Any], Boolean),
        "zuBuchstabe" | "zuZeichen" => NativeSignature::new(vec![Any], Buchstabe),
        "zuText" | "zuZeichenkette" => NativeSignature::new(vec![Any], Text),

        "Laenge" => NativeSignature::new(vec![Any], Zahl),

        "Zuschneiden" => NativeSignature::new(vec![Exact(Text), Numeric, Numeric], Text),
        "Spalten" => NativeSignature::new(vec![Exact(Text), TextLike], TexteArr),
        "Ersetzen" => NativeSignature::new(vec![Exact(Text), TextLike, TextLike], Text),
        "Entfernen" => NativeSignature::new(vec![Exact(Text), Numeric, Numeric], Text),
        "Einfügen" => NativeSignature::new(vec![Exact(Text), Exact(Text), Numeric], Text),
        "Enthält" => NativeSignature::new(vec![Exact(Text), TextLike], Boolean),
        "Beschneiden" => NativeSignature::new(vec![Exact(Text)], Text),

        "Max" | "Min" => NativeSignature::new(vec![Numeric, Numeric], Kommazahl),
        "Clamp" => NativeSignature::new(vec![Numeric, Numeric, Numeric], Kommazahl),
        "Trunkiert" | "Rund" | "Decke" | "Boden" => NativeSignature::new(vec![Numeric], Zahl),

        _ => return None,
    };
    Some(sig)
}

/// Owns the `name -> handler` map the VM dispatches `CALL` against. Built
/// once at VM construction and shared for the run's lifetime.
pub struct NativeRegistry {
    handlers: HashMap<&'static str, NativeFn>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, NativeFn> = HashMap::new();
        handlers.insert("schreibe", io::schreibe);
        handlers.insert("schreibeZeile", io::schreibe_zeile);
        handlers.insert("lese", io::lese);
        handlers.insert("leseZeile", io::lese_zeile);
        handlers.insert("existiertDatei", io::existiert_datei);
        handlers.insert("leseDatei", io::lese_datei);
        handlers.insert("schreibeDatei", io::schreibe_datei);
        handlers.insert("bearbeiteDatei", io::bearbeite_datei);
        handlers.insert("leseBytes", io::lese_bytes);
        handlers.insert("schreibeBytes", io::schreibe_bytes);
        handlers.insert("bearbeiteBytes", io::bearbeite_bytes);

        handlers.insert("clock", time::clock);
        handlers.insert("warte", time::warte);

        handlers.insert("zuZahl", numeric::zu_zahl);
        handlers.insert("zuKommazahl", numeric::zu_kommazahl);
        handlers.insert("zuBoolean", numeric::zu_boolean);
        handlers.insert("zuBuchstabe", numeric::zu_buchstabe);
        handlers.insert("zuZeichen", numeric::zu_buchstabe);
        handlers.insert("zuText", numeric::zu_text);
        handlers.insert("zuZeichenkette", numeric::zu_text);
        handlers.insert("Laenge", numeric::laenge);
        handlers.insert("Max", numeric::max);
        handlers.insert("Min", numeric::min);
        handlers.insert("Clamp", numeric::clamp);
        handlers.insert("Trunkiert", numeric::trunkiert);
        handlers.insert("Rund", numeric::rund);
        handlers.insert("Decke", numeric::decke);
        handlers.insert("Boden", numeric::boden);

        handlers.insert("Zuschneiden", text::zuschneiden);
        handlers.insert("Spalten", text::spalten);
        handlers.insert("Ersetzen", text::ersetzen);
        handlers.insert("Entfernen", text::entfernen);
        handlers.insert("Einfügen", text::einfuegen);
        handlers.insert("Enthält", text::enthaelt);
        handlers.insert("Beschneiden", text::beschneiden);

        NativeRegistry { handlers }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        match self.handlers.get(name) {
            Some(f) => f(args),
            None => Err(format!("Unbekannte Funktion '{}'!", name)),
        }
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_signature_finds_schreibe() {
        let sig = lookup_signature("schreibe").unwrap();
        assert_eq!(sig.params, vec![ParamKind::Any]);
        assert_eq!(sig.return_type, ValueType::None);
    }

    #[test]
    fn lookup_signature_is_none_for_unknown_name() {
        assert!(lookup_signature("nichtVorhanden").is_none());
    }

    #[test]
    fn registry_dispatches_by_name() {
        let registry = NativeRegistry::new();
        let result = registry.call("Laenge", &[Value::String("hallo".into())]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn registry_rejects_unknown_native() {
        let registry = NativeRegistry::new();
        assert!(registry.call("nichtVorhanden", &[]).is_err());
    }
}
