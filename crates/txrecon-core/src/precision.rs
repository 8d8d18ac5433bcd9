//! Exact-integer rewrite for nanosecond timestamp fields.
//!
//! The indexer may emit nanosecond timestamps as JSON numbers. Values above
//! 2^53 lose precision in any consumer that decodes numbers as doubles, and
//! some serializers fall back to exponential notation. This pass rewrites
//! those values as decimal strings before anything decodes them.

use serde_json::{Number, Value};

use crate::types::MAX_SAFE_INTEGER;

/// Field names whose numeric values carry nanosecond timestamps.
pub const PRECISION_FIELDS: [&str; 2] = ["consensus_timestamp", "valid_start_ns"];

/// Walk the whole tree and rewrite unsafe timestamp numbers as exact
/// integer strings. Everything else is left untouched.
pub fn fix_precision(mut value: Value) -> Value {
    fix_in_place(&mut value);
    value
}

fn fix_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if PRECISION_FIELDS.contains(&key.as_str()) {
                    if let Value::Number(number) = child {
                        if let Some(exact) = exact_integer_string(number) {
                            *child = Value::String(exact);
                        }
                        continue;
                    }
                }
                fix_in_place(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(fix_in_place),
        _ => {}
    }
}

/// Returns the exact decimal rendering when `number` is outside the
/// double-safe range or would print in exponential form, `None` otherwise.
fn exact_integer_string(number: &Number) -> Option<String> {
    if let Some(unsigned) = number.as_u64() {
        return (unsigned > MAX_SAFE_INTEGER).then(|| unsigned.to_string());
    }
    if let Some(signed) = number.as_i64() {
        return (signed.unsigned_abs() > MAX_SAFE_INTEGER).then(|| signed.to_string());
    }

    let float = number.as_f64()?;
    let exponential = number.to_string().contains(['e', 'E']);
    if float.is_finite() && (float.abs() > MAX_SAFE_INTEGER as f64 || exponential) {
        Some(format!("{float:.0}"))
    } else {
        None
    }
}
