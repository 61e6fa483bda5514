// ============================================================================
// spark-components - Equality Functions
// Decide whether a write is a change at all
// ============================================================================

use serde_json::{Number, Value};

/// Equality function used by a change store to gate writes.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

// =============================================================================
// STRICT EQUALITY
// =============================================================================

/// Plain `PartialEq`. The gate used for state stores.
///
/// # Example
/// ```
/// use spark_components::reactivity::equality::equals;
///
/// assert!(equals(&true, &true));
/// assert!(!equals(&true, &false));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

// =============================================================================
// VALUE EQUALITY
// =============================================================================

/// Equality for dynamic values where every number is one numeric type.
///
/// `serde_json` keeps `1` and `1.0` apart; a property written as either must
/// still count as unchanged. Arrays and objects compare element-wise with the
/// same rule. This is the gate used for property stores.
///
/// # Example
/// ```
/// use serde_json::json;
/// use spark_components::reactivity::equality::value_equals;
///
/// assert!(value_equals(&json!(1), &json!(1.0)));
/// assert!(value_equals(&json!({ "x": [1, 2] }), &json!({ "x": [1.0, 2] })));
/// assert!(!value_equals(&json!("1"), &json!(1)));
/// ```
pub fn value_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_equals(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| value_equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| value_equals(x, y)))
        }
        _ => a == b,
    }
}

/// Compare two JSON numbers by value across integer and float storage.
pub fn number_equals(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================
