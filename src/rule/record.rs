//! Persisted record form of a rule tree
//!
//! A record mirrors the tree exactly:
//! `{"type": "operator"|"operand", "value": <string>, "left"?: <record>, "right"?: <record>}`
//! where `left`/`right` are present only on operators.
//!
//! Loading enforces [`EngineConfig::max_depth`], so a stored tree is
//! accepted exactly when `compile` or `combine` could have produced it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{EngineConfig, DEFAULT_CONFIG};
use crate::error::{Result, RuleError};
use crate::rule::ast::{LogicalOp, Node, NodeKind};
use crate::rule::parser::parse_condition;

/// Typed mirror of the persisted record shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<NodeRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<NodeRecord>>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let (left, right) = match node {
            Node::Operator { left, right, .. } => (
                Some(Box::new(NodeRecord::from(left.as_ref()))),
                Some(Box::new(NodeRecord::from(right.as_ref()))),
            ),
            Node::Operand(_) => (None, None),
        };
        NodeRecord {
            kind: node.kind().as_str().to_string(),
            value: Some(node.value()),
            left,
            right,
        }
    }
}

impl TryFrom<NodeRecord> for Node {
    type Error = RuleError;

    fn try_from(record: NodeRecord) -> Result<Self> {
        node_from_record(record, 1, DEFAULT_CONFIG.max_depth)
    }
}

fn too_deep(max_depth: usize) -> RuleError {
    RuleError::DeserializationError(format!("record nested deeper than {}", max_depth))
}

fn node_from_record(record: NodeRecord, depth: usize, max_depth: usize) -> Result<Node> {
    if depth > max_depth {
        return Err(too_deep(max_depth));
    }
    let kind = match record.kind.as_str() {
        "operator" => NodeKind::Operator,
        "operand" => NodeKind::Operand,
        other => {
            return Err(RuleError::DeserializationError(format!(
                "unrecognized node type '{}'",
                other
            )))
        }
    };
    let value = record.value.ok_or_else(|| {
        RuleError::DeserializationError(format!("{} node is missing its value", kind.as_str()))
    })?;

    match kind {
        NodeKind::Operator => {
            let (Some(left), Some(right)) = (record.left, record.right) else {
                return Err(RuleError::DeserializationError(
                    "operator node requires both left and right children".to_string(),
                ));
            };
            let op = match value.as_str() {
                "and" => LogicalOp::And,
                "or" => LogicalOp::Or,
                other => {
                    return Err(RuleError::MalformedNode(format!(
                        "unknown operator symbol '{}'",
                        other
                    )))
                }
            };
            Ok(Node::Operator {
                op,
                left: Arc::new(node_from_record(*left, depth + 1, max_depth)?),
                right: Arc::new(node_from_record(*right, depth + 1, max_depth)?),
            })
        }
        NodeKind::Operand => {
            if record.left.is_some() || record.right.is_some() {
                return Err(RuleError::DeserializationError(
                    "operand node must not have children".to_string(),
                ));
            }
            let condition = parse_condition(&value).map_err(|e| {
                RuleError::MalformedNode(format!("invalid condition text '{}': {}", value, e))
            })?;
            Ok(Node::Operand(condition))
        }
    }
}

/// Convert a tree into its plain nested record
pub fn to_record(node: &Node) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(node.kind().as_str().to_string()));
    map.insert("value".to_string(), Value::String(node.value()));
    if let Node::Operator { left, right, .. } = node {
        map.insert("left".to_string(), to_record(left));
        map.insert("right".to_string(), to_record(right));
    }
    Value::Object(map)
}

/// Rebuild a tree from its record with the default limits
pub fn from_record(record: &Value) -> Result<Node> {
    from_record_with(record, &DEFAULT_CONFIG)
}

/// Rebuild a tree from its record
pub fn from_record_with(record: &Value, config: &EngineConfig) -> Result<Node> {
    if !record.is_object() {
        return Err(RuleError::DeserializationError(
            "record must be an object".to_string(),
        ));
    }
    check_record_depth(record, config.max_depth)?;
    let typed = NodeRecord::deserialize(record)
        .map_err(|e| RuleError::DeserializationError(e.to_string()))?;
    finish(typed, config)
}

/// Serialize a tree to a JSON string
pub fn to_json(node: &Node) -> String {
    to_record(node).to_string()
}

/// Parse a JSON string produced by [`to_json`] with the default limits
pub fn from_json(json: &str) -> Result<Node> {
    from_json_with(json, &DEFAULT_CONFIG)
}

/// Parse a JSON string produced by [`to_json`]
///
/// serde_json's fixed recursion limit is lifted; the document's nesting is
/// bounded by `config.max_depth` before it is parsed instead.
pub fn from_json_with(json: &str, config: &EngineConfig) -> Result<Node> {
    if json_nesting_exceeds(json, config.max_depth) {
        return Err(too_deep(config.max_depth));
    }
    let to_error = |e: serde_json::Error| RuleError::DeserializationError(e.to_string());
    let mut deserializer = serde_json::Deserializer::from_str(json);
    deserializer.disable_recursion_limit();
    let typed = NodeRecord::deserialize(&mut deserializer).map_err(to_error)?;
    deserializer.end().map_err(to_error)?;
    finish(typed, config)
}

fn finish(typed: NodeRecord, config: &EngineConfig) -> Result<Node> {
    let node = node_from_record(typed, 1, config.max_depth)?;
    tracing::debug!(operands = node.operand_count(), depth = node.depth(), "deserialized rule");
    Ok(node)
}

/// Walk the `left`/`right` chain without recursing
fn check_record_depth(record: &Value, max_depth: usize) -> Result<()> {
    let mut pending = vec![(record, 1)];
    while let Some((value, depth)) = pending.pop() {
        if depth > max_depth {
            return Err(too_deep(max_depth));
        }
        for side in ["left", "right"] {
            if let Some(child) = value.get(side) {
                pending.push((child, depth + 1));
            }
        }
    }
    Ok(())
}

/// Whether objects and arrays in `json` nest deeper than `max_depth`
fn json_nesting_exceeds(json: &str, max_depth: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for byte in json.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > max_depth {
                    return true;
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}
