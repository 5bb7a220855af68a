//! Rule Engine Core - rule expression compiler and evaluator
//!
//! This crate compiles boolean/comparison expressions such as
//! `age > 30 AND department == 'Sales'` into a typed AST, evaluates trees
//! against key-value data, folds several rules into one, and converts trees
//! to and from a stable record form for persistence.
//!
//! ```
//! use rule_engine_core::{compile, evaluate, from_record, to_record};
//! use serde_json::json;
//!
//! let rule = compile("age > 30 AND department == 'Sales'").unwrap();
//! let stored = to_record(&rule);
//! let rule = from_record(&stored).unwrap();
//! assert!(evaluate(&rule, &json!({"age": 35, "department": "Sales"})).unwrap());
//! ```
//!
//! Python bindings are available behind the `python` feature.

pub mod config;
pub mod error;
pub mod rule;

#[cfg(feature = "python")]
mod python;

pub use crate::config::EngineConfig;
pub use crate::error::{Result, RuleError};
pub use crate::rule::{
    combine, combine_all, combine_with, compile, compile_with, evaluate, evaluate_record,
    from_json, from_json_with, from_record, from_record_with, normalize, to_json, to_record,
    Comparator, Condition, DataRecord, Literal, LogicalOp, Node, NodeKind, NodeRecord, RuleCache,
};
