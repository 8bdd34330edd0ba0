//! Numeric casts, bounding, rounding, and `Laenge`. Grounded in
//! `original_source/src/Natives.cpp`'s `zuZahl`/`zuKommazahl`/`zuBoolean`/
//! `zuBuchstabe`/`zuText`/`Laenge`/`Max`/`Min`/`Clamp`/`Trunkiert`/`Rund`/
//! `Decke`/`Boden` free functions.

use crate::value::Value;

fn arg(args: &[Value], n: usize) -> Result<&Value, String> {
    args.get(n)
        .ok_or_else(|| format!("Es wurde kein Argument an Position {} übergeben!", n + 1))
}

fn as_f64(v: &Value) -> Result<f64, String> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Double(d) => Ok(*d),
        _ => Err(format!("{} ist keine Zahl!", v)),
    }
}

pub fn zu_zahl(args: &[Value]) -> Result<Value, String> {
    match arg(args, 0)? {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Double(d) => Ok(Value::Int(*d as i32)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::Char(c) => Ok(Value::Int(*c as i32)),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| "Diese Zeichenkette kann nicht in eine Zahl umgewandelt werden!".to_string()),
        v => Err(format!("{} kann nicht in eine Zahl umgewandelt werden!", v.value_type())),
    }
}

pub fn zu_kommazahl(args: &[Value]) -> Result<Value, String> {
    match arg(args, 0)? {
        Value::Int(n) => Ok(Value::Double(*n as f64)),
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::Bool(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
        Value::Char(c) => Ok(Value::Double(*c as f64)),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| "Diese Zeichenkette kann nicht in eine Kommazahl umgewandelt werden!".to_string()),
        v => Err(format!("{} kann nicht in eine Kommazahl umgewandelt werden!", v.value_type())),
    }
}

pub fn zu_boolean(args: &[Value]) -> Result<Value, String> {
    match arg(args, 0)? {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(n) => Ok(Value::Bool(*n != 0)),
        Value::Double(d) => Ok(Value::Bool(*d != 0.0)),
        Value::String(s) => match s.as_str() {
            "wahr" => Ok(Value::Bool(true)),
            "falsch" => Ok(Value::Bool(false)),
            _ => Err("Diese Zeichenkette kann nicht in einen Boolean umgewandelt werden!".to_string()),
        },
        v => Err(format!("{} kann nicht in einen Boolean umgewandelt werden!", v.value_type())),
    }
}

pub fn zu_buchstabe(args: &[Value]) -> Result<Value, String> {
    match arg(args, 0)? {
        Value::Char(c) => Ok(Value::Char(*c)),
        Value::Int(n) => Ok(Value::Char(*n as u16)),
        Value::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c as u16)),
                _ => Err("Nur eine Zeichenkette der Länge 1 kann in einen Buchstaben umgewandelt werden!".to_string()),
            }
        }
        v => Err(format!("{} kann nicht in einen Buchstaben umgewandelt werden!", v.value_type())),
    }
}

pub fn zu_text(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(arg(args, 0)?.to_string()))
}

pub fn laenge(args: &[Value]) -> Result<Value, String> {
    let len = match arg(args, 0)? {
        Value::String(s) => s.chars().count(),
        Value::IntArr(a) => a.len(),
        Value::DoubleArr(a) => a.len(),
        Value::BoolArr(a) => a.len(),
        Value::CharArr(a) => a.len(),
        Value::StringArr(a) => a.len(),
        v => return Err(format!("{} hat keine Länge!", v.value_type())),
    };
    Ok(Value::Int(len as i32))
}

/// Always widens to `Kommazahl`, matching the original's `Value(std::max(a, b))`
/// over two `double`s regardless of the arguments' own static types.
pub fn max(args: &[Value]) -> Result<Value, String> {
    let a = as_f64(arg(args, 0)?)?;
    let b = as_f64(arg(args, 1)?)?;
    Ok(Value::Double(a.max(b)))
}

pub fn min(args: &[Value]) -> Result<Value, String> {
    let a = as_f64(arg(args, 0)?)?;
    let b = as_f64(arg(args, 1)?)?;
    Ok(Value::Double(a.min(b)))
}

pub fn clamp(args: &[Value]) -> Result<Value, String> {
    let v = as_f64(arg(args, 0)?)?;
    let lo = as_f64(arg(args, 1)?)?;
    let hi = as_f64(arg(args, 2)?)?;
    Ok(Value::Double(v.clamp(lo, hi)))
}

pub fn trunkiert(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int(as_f64(arg(args, 0)?)?.trunc() as i32))
}

pub fn rund(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int(as_f64(arg(args, 0)?)?.round() as i32))
}

pub fn decke(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int(as_f64(arg(args, 0)?)?.ceil() as i32))
}

pub fn boden(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Int(as_f64(arg(args, 0)?)?.floor() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zu_zahl_parses_a_trimmed_string() {
        assert_eq!(zu_zahl(&[Value::String(" 42 ".into())]), Ok(Value::Int(42)));
    }

    #[test]
    fn zu_zahl_rejects_garbage() {
        assert!(zu_zahl(&[Value::String("abc".into())]).is_err());
    }

    #[test]
    fn laenge_counts_chars_not_bytes() {
        assert_eq!(laenge(&[Value::String("mär".into())]), Ok(Value::Int(3)));
    }

    #[test]
    fn max_widens_to_double() {
        assert_eq!(max(&[Value::Int(2), Value::Int(5)]), Ok(Value::Double(5.0)));
    }

    #[test]
    fn rund_rounds_half_away_from_zero() {
        assert_eq!(rund(&[Value::Double(2.5)]), Ok(Value::Int(3)));
    }

    #[test]
    fn boden_floors_negative_values() {
        assert_eq!(boden(&[Value::Double(-1.5)]), Ok(Value::Int(-2)));
    }
}
