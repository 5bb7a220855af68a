//! Property tests for the rule module
//!
//! Properties covered: record round-trip, display re-parse, compile/evaluate
//! consistency, combinator folding, evaluation purity, and keyword safety of
//! the normalizer.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use crate::error::RuleError;
use crate::rule::ast::{Comparator, Condition, Literal, LogicalOp, Node};
use crate::rule::cache::RuleCache;
use crate::rule::combinator::combine;
use crate::rule::evaluator::evaluate;
use crate::rule::parser::compile;
use crate::rule::record::{from_json, from_record, to_json, to_record};

// ═══════════════════════════════════════════════════════════════════════════
// Strategy generators for property tests
// ═══════════════════════════════════════════════════════════════════════════

/// Generate field names, including ones that embed connective keywords
fn field_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("age".to_string()),
        Just("salary".to_string()),
        Just("department".to_string()),
        Just("experience".to_string()),
        Just("BRAND".to_string()),
        Just("ORDERS".to_string()),
        Just("NOTE_AND".to_string()),
        Just("_score2".to_string()),
    ]
}

fn comparator_strategy() -> impl Strategy<Value = Comparator> {
    prop_oneof![Just(Comparator::Gt), Just(Comparator::Lt), Just(Comparator::Eq)]
}

fn logical_op_strategy() -> impl Strategy<Value = LogicalOp> {
    prop_oneof![Just(LogicalOp::And), Just(LogicalOp::Or)]
}

/// Generate string literal contents, quotes and backslashes included
fn string_content_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just('a'),
            Just('Z'),
            Just(' '),
            Just('\''),
            Just('"'),
            Just('\\'),
            Just('é'),
        ],
        0..8,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        any::<i64>().prop_map(Literal::Integer),
        (-1.0e6..1.0e6f64).prop_map(Literal::Decimal),
        string_content_strategy().prop_map(Literal::String),
    ]
}

fn condition_strategy() -> impl Strategy<Value = Condition> {
    (field_name_strategy(), comparator_strategy(), literal_strategy())
        .prop_map(|(field, comparator, literal)| Condition::new(field, comparator, literal))
}

/// Generate well-formed trees up to a few levels deep
fn node_strategy() -> impl Strategy<Value = Node> {
    let leaf = condition_strategy().prop_map(Node::Operand);
    leaf.prop_recursive(4, 32, 2, |inner| {
        (logical_op_strategy(), inner.clone(), inner)
            .prop_map(|(op, left, right)| Node::operator(op, left, right))
    })
}

/// Generate a data record carrying every field with a numeric value
fn numeric_data_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(-100..=100i64, 8).prop_map(|values| {
        let names = [
            "age",
            "salary",
            "department",
            "experience",
            "BRAND",
            "ORDERS",
            "NOTE_AND",
            "_score2",
        ];
        let map: Map<String, Value> = names
            .iter()
            .zip(values)
            .map(|(name, v)| (name.to_string(), json!(v)))
            .collect();
        Value::Object(map)
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Property Tests
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// Property 1: from_record(to_record(n)) rebuilds the same tree
    #[test]
    fn prop_record_round_trip(node in node_strategy()) {
        let rebuilt = from_record(&to_record(&node)).unwrap();
        prop_assert_eq!(&rebuilt, &node);

        let rebuilt = from_json(&to_json(&node)).unwrap();
        prop_assert_eq!(rebuilt, node);
    }

    /// Property 2: the rendered expression compiles back to the same tree
    #[test]
    fn prop_display_reparses(node in node_strategy()) {
        let text = node.to_string();
        let compiled = compile(&text);
        prop_assert!(compiled.is_ok(), "Failed to compile: {}", text);
        prop_assert_eq!(compiled.unwrap(), node, "Expression: {}", text);
    }

    /// Property 3: a single comparison evaluates like the native comparison
    #[test]
    fn prop_comparison_consistency(value in -1000..=1000i64, threshold in -1000..=1000i64) {
        let data = json!({"age": value});

        let node = compile(&format!("age > {}", threshold)).unwrap();
        prop_assert_eq!(evaluate(&node, &data).unwrap(), value > threshold);

        let node = compile(&format!("age < {}", threshold)).unwrap();
        prop_assert_eq!(evaluate(&node, &data).unwrap(), value < threshold);

        let node = compile(&format!("age == {}", threshold)).unwrap();
        prop_assert_eq!(evaluate(&node, &data).unwrap(), value == threshold);
    }

    /// Property 4: AND / OR follow boolean algebra
    #[test]
    fn prop_logical_composition(
        age in 0..=100i64,
        salary in 0..=100i64,
        age_threshold in 0..=100i64,
        salary_threshold in 0..=100i64
    ) {
        let data = json!({"age": age, "salary": salary});

        let both = age > age_threshold && salary > salary_threshold;
        let either = age > age_threshold || salary > salary_threshold;

        let node = compile(&format!("age > {} AND salary > {}", age_threshold, salary_threshold))
            .unwrap();
        prop_assert_eq!(evaluate(&node, &data).unwrap(), both);

        let node = compile(&format!("age > {} OR salary > {}", age_threshold, salary_threshold))
            .unwrap();
        prop_assert_eq!(evaluate(&node, &data).unwrap(), either);
    }

    /// Property 5: folding with OR is true iff any rule is true
    #[test]
    fn prop_combine_or_folding(values in prop::collection::vec(0..=5i64, 1..=6)) {
        let rules: Vec<Node> = (0..values.len())
            .map(|i| compile(&format!("f{} > 1", i)).unwrap())
            .collect();
        let data: Map<String, Value> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("f{}", i), json!(v)))
            .collect();

        let combined = combine(&rules, LogicalOp::Or).unwrap();
        prop_assert_eq!(evaluate(&combined, &data).unwrap(), values.iter().any(|v| *v > 1));

        let combined = combine(&rules, LogicalOp::And).unwrap();
        prop_assert_eq!(evaluate(&combined, &data).unwrap(), values.iter().all(|v| *v > 1));
        prop_assert_eq!(combined.operand_count(), rules.len());
    }

    /// Property 6: combining one rule returns it unwrapped
    #[test]
    fn prop_combine_single(node in node_strategy(), op in logical_op_strategy()) {
        let combined = combine(std::slice::from_ref(&node), op).unwrap();
        prop_assert_eq!(combined, node);
    }

    /// Property 7: evaluation is pure and survives a round-trip
    #[test]
    fn prop_evaluation_idempotent(node in node_strategy(), data in numeric_data_strategy()) {
        let first = evaluate(&node, &data);
        let second = evaluate(&node, &data);
        prop_assert_eq!(&first, &second);

        let rebuilt = from_record(&to_record(&node)).unwrap();
        prop_assert_eq!(evaluate(&rebuilt, &data), first);
    }

    /// Property 8: keywords inside string literals survive normalization
    #[test]
    fn prop_string_literals_untouched(
        words in prop::collection::vec(
            prop_oneof![Just("AND"), Just("OR"), Just("NOT"), Just("x")],
            1..5,
        )
    ) {
        let content = words.join(" ");
        let node = compile(&format!("department == '{}' AND age > 1", content)).unwrap();
        let data = json!({"department": content, "age": 2});
        prop_assert!(evaluate(&node, &data).unwrap());
    }

    /// Property 9: cached compiles match direct compiles
    #[test]
    fn prop_cache_consistency(node in node_strategy()) {
        let cache = RuleCache::default();
        let text = node.to_string();
        let direct = compile(&text).unwrap();
        let cached1 = cache.get_or_compile(&text).unwrap();
        let cached2 = cache.get_or_compile(&text).unwrap();
        prop_assert_eq!(&direct, &cached1);
        prop_assert_eq!(cached1, cached2);
    }
}

#[test]
fn test_missing_field_never_defaults() {
    let node = compile("age > 30 OR department == 'Sales'").unwrap();
    assert_eq!(
        evaluate(&node, &json!({"department": "Sales"})),
        Err(RuleError::MissingField("age".to_string()))
    );
}
