// SPDX-License-Identifier: MIT

//! Field path resolution and typed comparison operators
//!
//! Authored filter values are strings. The actual side is whatever the
//! payload, subscriber, tenant or webhook response carries, so every operator
//! family coerces both sides explicitly:
//! - equality and membership compare string forms
//! - ordering and ranges compare numbers
//! - `IS_DEFINED` only asks whether the path resolved

use serde_json::Value;

use super::types::{Condition, FilterOperator};

/// Rendering of a path that did not resolve
pub const UNDEFINED: &str = "undefined";

/// Resolve a dotted path (e.g. `data.nested.key`) against a structured value.
/// Numeric segments index into arrays. A missing segment yields `None`.
pub fn resolve<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(source);
    }

    let mut current = source;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// String form used for equality, membership and trace records
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None => UNDEFINED.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Numeric form used for ordering. Returns `None` for anything that is not
/// a number, a numeric string or a boolean.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Split an authored list value. Accepts a JSON array or comma separated items.
pub fn parse_list(expected: &str) -> Vec<String> {
    let trimmed = expected.trim();
    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            return items.iter().map(|item| stringify(Some(item))).collect();
        }
    }

    trimmed
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Apply `operator` to a resolved actual value and an authored expected value
pub fn compare(actual: Option<&Value>, expected: &str, operator: FilterOperator) -> bool {
    match operator {
        FilterOperator::Equal => values_equal(actual, expected),
        FilterOperator::NotEqual => !values_equal(actual, expected),
        FilterOperator::Larger => compare_numbers(actual, expected, |a, b| a > b),
        FilterOperator::Smaller => compare_numbers(actual, expected, |a, b| a < b),
        FilterOperator::LargerEqual => compare_numbers(actual, expected, |a, b| a >= b),
        FilterOperator::SmallerEqual => compare_numbers(actual, expected, |a, b| a <= b),
        FilterOperator::IsDefined => actual.is_some(),
        FilterOperator::In => is_in(actual, expected),
        FilterOperator::NotIn => !is_in(actual, expected),
        FilterOperator::AnyIn => array_matches(actual, expected, false),
        FilterOperator::AllIn => array_matches(actual, expected, true),
        FilterOperator::Like => is_like(actual, expected),
        FilterOperator::NotLike => !is_like(actual, expected),
        FilterOperator::Between => is_between(actual, expected),
        FilterOperator::NotBetween => !is_between(actual, expected),
    }
}

/// Resolve `field` in `source`, compare it and record the outcome
pub fn evaluate_field(
    filter: &str,
    source: Option<&Value>,
    field: &str,
    operator: FilterOperator,
    expected: &str,
) -> Condition {
    let actual = source.and_then(|s| resolve(s, field));
    let passed = compare(actual, expected, operator);

    Condition {
        filter: filter.to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        actual: stringify(actual),
        operator,
        passed,
    }
}

fn values_equal(actual: Option<&Value>, expected: &str) -> bool {
    match actual {
        None => false,
        Some(value) => stringify(Some(value)) == expected,
    }
}

fn compare_numbers<F>(actual: Option<&Value>, expected: &str, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (actual.and_then(to_number), parse_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn is_in(actual: Option<&Value>, expected: &str) -> bool {
    match actual {
        None => false,
        Some(value) => {
            let needle = stringify(Some(value));
            parse_list(expected).iter().any(|item| *item == needle)
        }
    }
}

fn array_matches(actual: Option<&Value>, expected: &str, require_all: bool) -> bool {
    let Some(Value::Array(items)) = actual else {
        return false;
    };
    let present: Vec<String> = items.iter().map(|item| stringify(Some(item))).collect();
    let wanted = parse_list(expected);

    if require_all {
        !wanted.is_empty() && wanted.iter().all(|w| present.contains(w))
    } else {
        wanted.iter().any(|w| present.contains(w))
    }
}

fn is_like(actual: Option<&Value>, expected: &str) -> bool {
    match actual {
        None => false,
        Some(value) => stringify(Some(value)).contains(expected),
    }
}

fn is_between(actual: Option<&Value>, expected: &str) -> bool {
    let bounds = parse_list(expected);
    let [low, high] = bounds.as_slice() else {
        return false;
    };
    match (
        actual.and_then(to_number),
        parse_number(low),
        parse_number(high),
    ) {
        (Some(n), Some(low), Some(high)) => n >= low && n <= high,
        _ => false,
    }
}
