//! Round-trip invariance of sandbox results.
//!
//! A result is accepted only if an independent recomputation elsewhere would
//! encode it identically: encoding it, decoding that text, and encoding again
//! must give the same text, and it must not contain numbers that JSON
//! runtimes disagree on.

use folio_core::script::ExecutionFailed;
use serde_json::Value;

/// Largest integer every IEEE-754 double runtime represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Check that `value` survives a serialize/deserialize round-trip unchanged.
///
/// # Errors
///
/// Returns a `NonInvariantResult` failure naming the offending location.
pub fn ensure_round_trip_invariant(value: Value) -> Result<Value, ExecutionFailed> {
    check_numbers(&value, &mut String::new())?;

    let first = serde_json::to_string(&value)
        .map_err(|e| ExecutionFailed::non_invariant(format!("result is not serializable: {e}")))?;
    let reparsed: Value = serde_json::from_str(&first).map_err(|e| {
        ExecutionFailed::non_invariant(format!("encoded result does not decode: {e}"))
    })?;
    let second = serde_json::to_string(&reparsed)
        .map_err(|e| ExecutionFailed::non_invariant(format!("result is not serializable: {e}")))?;

    if first != second || reparsed != value {
        return Err(ExecutionFailed::non_invariant(
            "result changes when re-encoded",
        ));
    }
    Ok(reparsed)
}

fn check_numbers(value: &Value, path: &mut String) -> Result<(), ExecutionFailed> {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                if f == 0.0 && f.is_sign_negative() {
                    return Err(ExecutionFailed::non_invariant(format!(
                        "negative zero at '{path}' does not round-trip across runtimes"
                    )));
                }
                if f.fract() == 0.0 && f.abs() > MAX_SAFE_INTEGER {
                    return Err(ExecutionFailed::non_invariant(format!(
                        "integer at '{path}' exceeds the exactly representable range"
                    )));
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push('/');
                path.push_str(&i.to_string());
                check_numbers(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map {
                let len = path.len();
                path.push('/');
                path.push_str(&key.replace('~', "~0").replace('/', "~1"));
                check_numbers(item, path)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}
