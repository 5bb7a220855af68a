//! Rule combinator
//!
//! Folds independently compiled rules into one left-leaning tree. Inputs are
//! shared, not copied: the new operator nodes point at the existing subtrees.

use std::sync::Arc;

use crate::config::{EngineConfig, DEFAULT_CONFIG};
use crate::error::{Result, RuleError};
use crate::rule::ast::{LogicalOp, Node};

/// Fold rules left to right under one connective, with the default limits
///
/// A single rule is returned as is, without a wrapping operator.
pub fn combine(rules: &[Node], op: LogicalOp) -> Result<Node> {
    combine_with(rules, op, &DEFAULT_CONFIG)
}

/// Fold rules left to right under one connective
///
/// The depth of the result is checked before any node is built; a fold that
/// would exceed `config.max_depth` is rejected.
pub fn combine_with(rules: &[Node], op: LogicalOp, config: &EngineConfig) -> Result<Node> {
    let (first, rest) = rules.split_first().ok_or_else(|| {
        RuleError::InvalidArgument("cannot combine an empty list of rules".to_string())
    })?;

    let mut depth = first.depth();
    for next in rest {
        if depth > config.max_depth {
            break;
        }
        depth = 1 + depth.max(next.depth());
    }
    if depth > config.max_depth {
        return Err(RuleError::InvalidArgument(format!(
            "combining {} rules would build a tree deeper than {}",
            rules.len(),
            config.max_depth
        )));
    }

    let combined = rest.iter().fold(first.clone(), |acc, next| Node::Operator {
        op,
        left: Arc::new(acc),
        right: Arc::new(next.clone()),
    });

    tracing::debug!(rules = rules.len(), connective = %op, "combined rules");
    Ok(combined)
}

/// Fold rules with `and`
pub fn combine_all(rules: &[Node]) -> Result<Node> {
    combine(rules, LogicalOp::And)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::evaluator::evaluate;
    use crate::rule::parser::compile;
    use serde_json::json;

    fn rules(expressions: &[&str]) -> Vec<Node> {
        expressions.iter().map(|e| compile(e).unwrap()).collect()
    }

    #[test]
    fn test_combine_or() {
        let combined = combine(&rules(&["a > 1", "b > 1", "c > 1"]), LogicalOp::Or).unwrap();
        assert!(evaluate(&combined, &json!({"a": 0, "b": 0, "c": 5})).unwrap());
        assert!(!evaluate(&combined, &json!({"a": 0, "b": 0, "c": 0})).unwrap());
    }

    #[test]
    fn test_combine_is_left_leaning() {
        let combined = combine(&rules(&["a > 1", "b > 1", "c > 1"]), LogicalOp::And).unwrap();
        assert_eq!(combined, compile("a > 1 AND b > 1 AND c > 1").unwrap());
        assert_eq!(combined.to_string(), "a > 1 and b > 1 and c > 1");
        assert_eq!(combined.depth(), 3);
    }

    #[test]
    fn test_combine_single_rule_unwrapped() {
        let input = rules(&["age > 30 OR department == 'Sales'"]);
        let combined = combine(&input, LogicalOp::And).unwrap();
        assert_eq!(combined, input[0]);
    }

    #[test]
    fn test_combine_empty() {
        assert!(matches!(
            combine(&[], LogicalOp::Or),
            Err(RuleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_combine_depth_limit() {
        let config = EngineConfig {
            max_depth: 3,
            ..EngineConfig::default()
        };
        let input = rules(&["a > 1", "b > 1", "c > 1"]);
        assert_eq!(combine_with(&input, LogicalOp::Or, &config).unwrap().depth(), 3);

        let input = rules(&["a > 1", "b > 1", "c > 1", "d > 1"]);
        assert!(matches!(
            combine_with(&input, LogicalOp::Or, &config),
            Err(RuleError::InvalidArgument(_))
        ));

        let input = rules(&["a > 1 AND b > 1 AND c > 1 AND d > 1"]);
        assert!(matches!(
            combine_with(&input, LogicalOp::Or, &config),
            Err(RuleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_combine_rejects_huge_fold_without_building_it() {
        let input = vec![compile("a > 1").unwrap(); 200_000];
        let err = combine(&input, LogicalOp::And).unwrap_err();
        assert!(matches!(err, RuleError::InvalidArgument(_)));

        let within = &input[..DEFAULT_CONFIG.max_depth];
        assert_eq!(
            combine(within, LogicalOp::And).unwrap().operand_count(),
            DEFAULT_CONFIG.max_depth
        );
    }

    #[test]
    fn test_combine_shares_subtrees() {
        let input = rules(&["a > 1 AND b > 1", "c > 1"]);
        let combined = combine(&input, LogicalOp::Or).unwrap();

        let (Node::Operator { left: input_left, .. }, Node::Operator { left: combined_left, .. }) =
            (&input[0], &combined)
        else {
            panic!("Expected operator nodes");
        };
        match combined_left.as_ref() {
            Node::Operator { left, .. } => assert!(Arc::ptr_eq(left, input_left)),
            _ => panic!("Expected the first rule on the left"),
        }
    }

    #[test]
    fn test_combine_compound_rules() {
        let combined = combine_all(&rules(&[
            "(age > 30 AND department == 'Sales') OR (age < 25 AND department == 'Marketing')",
            "salary > 50000 OR experience > 5",
        ]))
        .unwrap();
        let data = json!({"age": 32, "department": "Sales", "salary": 40000, "experience": 6});
        assert!(evaluate(&combined, &data).unwrap());
        let data = json!({"age": 32, "department": "Sales", "salary": 40000, "experience": 2});
        assert!(!evaluate(&combined, &data).unwrap());
    }
}
