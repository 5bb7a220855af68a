//! Rule evaluator

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use serde_json::{Map, Number, Value};

use crate::error::{Result, RuleError};
use crate::rule::ast::{Comparator, Condition, Literal, Node};
use crate::rule::record::from_record;

/// Key-value data a rule is evaluated against
pub trait DataRecord {
    /// Look up a top-level field
    fn field(&self, name: &str) -> Option<&Value>;
}

impl DataRecord for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Only JSON objects carry fields; any other value has none
impl DataRecord for Value {
    fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(name))
    }
}

impl<S: BuildHasher> DataRecord for HashMap<String, Value, S> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl DataRecord for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<T: DataRecord + ?Sized> DataRecord for &T {
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}

/// Evaluate a tree against a data record
///
/// Both children of an operator are always evaluated, so a missing field or
/// type mismatch is reported even when the other branch already decides the
/// result.
pub fn evaluate<D: DataRecord + ?Sized>(node: &Node, data: &D) -> Result<bool> {
    match node {
        Node::Operator { op, left, right } => {
            let left = evaluate(left, data)?;
            let right = evaluate(right, data)?;
            Ok(op.apply(left, right))
        }
        Node::Operand(cond) => check_condition(cond, data),
    }
}

/// Deserialize a persisted record and evaluate it
pub fn evaluate_record<D: DataRecord + ?Sized>(record: &Value, data: &D) -> Result<bool> {
    let node = from_record(record)?;
    evaluate(&node, data)
}

fn check_condition<D: DataRecord + ?Sized>(cond: &Condition, data: &D) -> Result<bool> {
    let value = data
        .field(&cond.field)
        .ok_or_else(|| RuleError::MissingField(cond.field.clone()))?;

    match &cond.literal {
        Literal::String(expected) => {
            let actual = value.as_str().ok_or_else(|| mismatch(cond, "string", value))?;
            match cond.comparator {
                Comparator::Eq => Ok(actual == expected),
                // ordering is only defined for numbers
                Comparator::Gt | Comparator::Lt => Err(RuleError::TypeMismatch {
                    field: cond.field.clone(),
                    expected: "number",
                    found: "string",
                }),
            }
        }
        Literal::Integer(expected) => {
            let actual = as_number(value).ok_or_else(|| mismatch(cond, "number", value))?;
            match actual.as_i64() {
                Some(actual) => Ok(compare(cond.comparator, actual, *expected)),
                None => Ok(compare(cond.comparator, to_f64(actual), *expected as f64)),
            }
        }
        Literal::Decimal(expected) => {
            let actual = as_number(value).ok_or_else(|| mismatch(cond, "number", value))?;
            Ok(compare(cond.comparator, to_f64(actual), *expected))
        }
    }
}

fn as_number(value: &Value) -> Option<&Number> {
    match value {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

fn to_f64(n: &Number) -> f64 {
    // always Some unless serde_json's arbitrary_precision is enabled
    n.as_f64().unwrap_or(f64::NAN)
}

fn compare<T: PartialOrd>(comparator: Comparator, actual: T, expected: T) -> bool {
    match comparator {
        Comparator::Gt => actual > expected,
        Comparator::Lt => actual < expected,
        Comparator::Eq => actual == expected,
    }
}

fn mismatch(cond: &Condition, expected: &'static str, found: &Value) -> RuleError {
    RuleError::TypeMismatch {
        field: cond.field.clone(),
        expected,
        found: type_name(found),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
