//! File and console I/O natives. Grounded in
//! `original_source/src/Natives.cpp`'s `schreibe`/`schreibeZeile`/`lese`/
//! `leseZeile`/`existiertDatei`/`leseDatei`/`schreibeDatei`/
//! `bearbeiteDatei`/`leseBytes`/`schreibeBytes`/`bearbeiteBytes` free
//! functions. Each maps an `std::io`/`std::fs` failure onto the
//! German-language runtime error the original throws for the same condition.

use crate::value::Value;
use std::fs;
use std::io::{self, Read, Write};

pub fn schreibe(args: &[Value]) -> Result<Value, String> {
    let v = args.get(0).ok_or_else(|| "Es wurde kein Argument übergeben!".to_string())?;
    print!("{}", v);
    io::stdout().flush().map_err(|e| e.to_string())?;
    Ok(Value::None)
}

pub fn schreibe_zeile(args: &[Value]) -> Result<Value, String> {
    let v = args.get(0).ok_or_else(|| "Es wurde kein Argument übergeben!".to_string())?;
    println!("{}", v);
    Ok(Value::None)
}

/// Reads a single byte from standard input, mirroring the original's
/// `(short)std::cin.get()` - not a full UTF-8 decode of the next codepoint.
pub fn lese(_args: &[Value]) -> Result<Value, String> {
    let mut buf = [0u8; 1];
    match io::stdin().read_exact(&mut buf) {
        Ok(()) => Ok(Value::Char(buf[0] as u16)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(Value::Char(0xFFFF)),
        Err(e) => Err(format!("Fehler beim Lesen von der Konsole: {}", e)),
    }
}

pub fn lese_zeile(_args: &[Value]) -> Result<Value, String> {
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("Fehler beim Lesen von der Konsole: {}", e))?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::String(line))
}

fn text_arg(args: &[Value], n: usize) -> Result<&str, String> {
    match args.get(n) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(v) => Err(format!("{} ist kein Text!", v)),
        None => Err(format!("Es wurde kein Argument an Position {} übergeben!", n + 1)),
    }
}

pub fn existiert_datei(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    Ok(Value::Bool(std::path::Path::new(path).is_file()))
}

pub fn lese_datei(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    fs::read_to_string(path).map(Value::String).map_err(|e| format!("Die Datei '{}' konnte nicht gelesen werden: {}", path, e))
}

pub fn schreibe_datei(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    let content = text_arg(args, 1)?;
    fs::write(path, content)
        .map(|_| Value::None)
        .map_err(|e| format!("Die Datei '{}' konnte nicht geschrieben werden: {}", path, e))
}

/// Appends `content` to `path`, creating it if necessary - the original's
/// `bearbeiteDatei`.
pub fn bearbeite_datei(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    let content = text_arg(args, 1)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(content.as_bytes()))
        .map(|_| Value::None)
        .map_err(|e| format!("Die Datei '{}' konnte nicht bearbeitet werden: {}", path, e))
}

pub fn lese_bytes(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    let bytes = fs::read(path).map_err(|e| format!("Die Datei '{}' konnte nicht gelesen werden: {}", path, e))?;
    Ok(Value::IntArr(bytes.into_iter().map(|b| b as i32).collect()))
}

fn int_arr_arg(args: &[Value], n: usize) -> Result<&Vec<i32>, String> {
    match args.get(n) {
        Some(Value::IntArr(a)) => Ok(a),
        Some(v) => Err(format!("{} ist keine Zahlenliste!", v)),
        None => Err(format!("Es wurde kein Argument an Position {} übergeben!", n + 1)),
    }
}

/// `(Text path, Zahlen bytes)`. Overwrites `path` with `bytes`, creating it
/// if necessary - matches `schreibeDatei`'s overwrite semantics.
pub fn schreibe_bytes(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    let bytes = int_arr_arg(args, 1)?;
    let raw: Vec<u8> = bytes.iter().map(|n| *n as u8).collect();
    fs::write(path, &raw)
        .map(|_| Value::None)
        .map_err(|e| format!("Die Datei '{}' konnte nicht geschrieben werden: {}", path, e))
}

/// `(Text path, Zahlen bytes)`. Appends `bytes` to `path`; unlike
/// `schreibeBytes`, the original requires the file to already exist.
pub fn bearbeite_bytes(args: &[Value]) -> Result<Value, String> {
    let path = text_arg(args, 0)?;
    let bytes = int_arr_arg(args, 1)?;
    if !std::path::Path::new(path).exists() {
        return Err(format!("Die Datei '{}' existiert nicht und kann somit nicht bearbeitet werden!", path));
    }
    let raw: Vec<u8> = bytes.iter().map(|n| *n as u8).collect();
    fs::OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut f| f.write_all(&raw))
        .map(|_| Value::None)
        .map_err(|e| format!("Die Datei '{}' konnte nicht geschrieben werden: {}", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn existiert_datei_is_false_for_missing_path() {
        assert_eq!(existiert_datei(&[Value::String("/no/such/path".into())]), Ok(Value::Bool(false)));
    }

    #[test]
    fn schreibe_datei_then_lese_datei_roundtrips() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        schreibe_datei(&[Value::String(path.clone()), Value::String("hallo welt".into())]).unwrap();
        let content = lese_datei(&[Value::String(path)]).unwrap();
        assert_eq!(content, Value::String("hallo welt".into()));
    }

    #[test]
    fn bearbeite_bytes_appends_to_an_existing_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        schreibe_bytes(&[Value::String(path.clone()), Value::IntArr(vec![1, 2])]).unwrap();
        bearbeite_bytes(&[Value::String(path.clone()), Value::IntArr(vec![3])]).unwrap();
        let bytes = lese_bytes(&[Value::String(path)]).unwrap();
        assert_eq!(bytes, Value::IntArr(vec![1, 2, 3]));
    }

    #[test]
    fn bearbeite_bytes_fails_when_the_file_does_not_exist() {
        assert!(bearbeite_bytes(&[Value::String("/no/such/path".into()), Value::IntArr(vec![1])]).is_err());
    }
}
