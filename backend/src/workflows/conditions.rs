// Workflow Conditions - evaluate a rule's conditions against an event context

use cadence_shared::{Condition, ConditionOperator};
use serde_json::Value;

use super::context::EventContext;

/// True when every condition holds. An empty list always matches.
pub fn matches(conditions: &[Condition], context: &EventContext) -> bool {
    conditions.iter().all(|condition| evaluate(condition, context))
}

/// Evaluate one condition. Never panics; anything unresolvable fails closed.
pub fn evaluate(condition: &Condition, context: &EventContext) -> bool {
    let actual = context.resolve(&condition.field);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => primitive_eq(actual, expected).unwrap_or(false),
        ConditionOperator::NotEquals => primitive_eq(actual, expected).is_some_and(|equal| !equal),
        ConditionOperator::GreaterThan => compare_numbers(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => compare_numbers(actual, expected, |a, b| a < b),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::In => match expected {
            Value::Array(candidates) => candidates
                .iter()
                .any(|candidate| primitive_eq(actual, candidate) == Some(true)),
            _ => false,
        },
    }
}

/// Equality on primitives. `None` when either side is an object or array.
///
/// An absent field is treated as null. Types are strict: `"100"` is not `100`.
fn primitive_eq(actual: Option<&Value>, expected: &Value) -> Option<bool> {
    let actual = actual.unwrap_or(&Value::Null);

    match (actual, expected) {
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => None,
        (Value::Number(a), Value::Number(b)) => Some(match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        }),
        (a, b) => Some(a == b),
    }
}

fn compare_numbers(actual: Option<&Value>, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    let actual = actual.and_then(Value::as_f64);
    let expected = expected.as_f64();

    match (actual, expected) {
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => cmp(a, b),
        _ => false,
    }
}

fn contains(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Some(Value::Array(items)), needle) => items
            .iter()
            .any(|item| primitive_eq(Some(item), needle) == Some(true)),
        _ => false,
    }
}
