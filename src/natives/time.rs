//! `clock` and `warte`. Grounded in `original_source/src/Natives.cpp`'s
//! `clock`, which returns seconds (as a double) since an arbitrary epoch -
//! here, since process start, via a lazily-initialized `Instant`.

use crate::value::Value;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

fn start_time() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

pub fn clock(_args: &[Value]) -> Result<Value, String> {
    Ok(Value::Double(start_time().elapsed().as_secs_f64()))
}

pub fn warte(args: &[Value]) -> Result<Value, String> {
    let seconds = match args.get(0) {
        Some(Value::Int(n)) => *n as f64,
        Some(Value::Double(d)) => *d,
        Some(v) => return Err(format!("{} ist keine Zahl!", v)),
        None => return Err("Es wurde kein Argument übergeben!".to_string()),
    };
    if seconds.is_sign_negative() {
        return Err("Die Wartezeit darf nicht negativ sein!".to_string());
    }
    std::thread::sleep(Duration::from_secs_f64(seconds));
    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reports_a_non_negative_elapsed_time() {
        match clock(&[]).unwrap() {
            Value::Double(d) => assert!(d >= 0.0),
            other => panic!("expected Double, got {:?}", other),
        }
    }

    #[test]
    fn warte_rejects_negative_durations() {
        assert!(warte(&[Value::Int(-1)]).is_err());
    }
}
