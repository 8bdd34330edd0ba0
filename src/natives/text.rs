//! Text manipulation natives: `Zuschneiden`, `Spalten`, `Ersetzen`,
//! `Entfernen`, `Einfügen`, `Enthält`, `Beschneiden`. Grounded in
//! `original_source/src/Natives.cpp`, which clamps out-of-range start/length
//! arguments rather than raising an error for them - this crate keeps that
//! behavior rather than tightening it into a hard runtime error.

use crate::value::Value;

fn text_arg(args: &[Value], n: usize) -> Result<&str, String> {
    match args.get(n) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(v) => Err(format!("{} ist kein Text!", v)),
        None => Err(format!("Es wurde kein Argument an Position {} übergeben!", n + 1)),
    }
}

fn int_arg(args: &[Value], n: usize) -> Result<i32, String> {
    match args.get(n) {
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Double(d)) => Ok(*d as i32),
        Some(v) => Err(format!("{} ist keine Zahl!", v)),
        None => Err(format!("Es wurde kein Argument an Position {} übergeben!", n + 1)),
    }
}

/// Either a `Buchstabe` or a `Text` collapses to an owned `String`, matching
/// how the original dispatches on `args.at(n).Type()` for delimiter/needle
/// positions instead of demanding one fixed type.
fn text_like_arg(args: &[Value], n: usize) -> Result<String, String> {
    match args.get(n) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Char(c)) => Ok(Value::char_to_string(*c)),
        Some(v) => Err(format!("{} ist weder Text noch Buchstabe!", v)),
        None => Err(format!("Es wurde kein Argument an Position {} übergeben!", n + 1)),
    }
}

fn clamp_range(len: usize, start: i32, length: i32) -> (usize, usize) {
    let start = start.max(0) as usize;
    let start = start.min(len);
    let length = length.max(0) as usize;
    let end = (start + length).min(len);
    (start, end)
}

pub fn zuschneiden(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let start = int_arg(args, 1)?;
    let length = int_arg(args, 2)?;
    let chars: Vec<char> = s.chars().collect();
    let (start, end) = clamp_range(chars.len(), start, length);
    Ok(Value::String(chars[start..end].iter().collect()))
}

pub fn spalten(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let sep = text_like_arg(args, 1)?;
    let parts = if sep.is_empty() {
        vec![s.to_string()]
    } else {
        s.split(sep.as_str()).map(|p| p.to_string()).collect()
    };
    Ok(Value::StringArr(parts))
}

pub fn ersetzen(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let from = text_like_arg(args, 1)?;
    let to = text_like_arg(args, 2)?;
    if from.is_empty() {
        return Ok(Value::String(s.to_string()));
    }
    Ok(Value::String(s.replace(from.as_str(), &to)))
}

pub fn entfernen(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let start = int_arg(args, 1)?;
    let length = int_arg(args, 2)?;
    let chars: Vec<char> = s.chars().collect();
    let (from, to) = clamp_range(chars.len(), start, length);
    let mut result: String = chars[..from].iter().collect();
    result.extend(&chars[to..]);
    Ok(Value::String(result))
}

pub fn einfuegen(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let insertion = text_arg(args, 1)?;
    let pos = int_arg(args, 2)?;
    let chars: Vec<char> = s.chars().collect();
    let pos = pos.max(0).min(chars.len() as i32) as usize;
    let mut result: String = chars[..pos].iter().collect();
    result.push_str(insertion);
    result.extend(&chars[pos..]);
    Ok(Value::String(result))
}

pub fn enthaelt(args: &[Value]) -> Result<Value, String> {
    let s = text_arg(args, 0)?;
    let needle = text_like_arg(args, 1)?;
    Ok(Value::Bool(s.contains(needle.as_str())))
}

pub fn beschneiden(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(text_arg(args, 0)?.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zuschneiden_takes_a_char_window() {
        let r = zuschneiden(&[Value::String("Hallo".into()), Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(r, Value::String("all".into()));
    }

    #[test]
    fn zuschneiden_clamps_past_the_end() {
        let r = zuschneiden(&[Value::String("ab".into()), Value::Int(0), Value::Int(50)]).unwrap();
        assert_eq!(r, Value::String("ab".into()));
    }

    #[test]
    fn spalten_accepts_a_char_separator() {
        let r = spalten(&[Value::String("a,b,c".into()), Value::Char(b',' as u16)]).unwrap();
        assert_eq!(r, Value::StringArr(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn ersetzen_replaces_all_occurrences() {
        let r = ersetzen(&[
            Value::String("aXaXa".into()),
            Value::String("X".into()),
            Value::String("-".into()),
        ])
        .unwrap();
        assert_eq!(r, Value::String("a-a-a".into()));
    }

    #[test]
    fn entfernen_removes_the_window() {
        let r = entfernen(&[Value::String("Hallo".into()), Value::Int(1), Value::Int(3)]).unwrap();
        assert_eq!(r, Value::String("Ho".into()));
    }

    #[test]
    fn enthaelt_checks_substring_presence() {
        assert_eq!(
            enthaelt(&[Value::String("Hallo".into()), Value::String("all".into())]),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn beschneiden_trims_whitespace() {
        assert_eq!(beschneiden(&[Value::String("  hi  ".into())]), Ok(Value::String("hi".into())));
    }
}
