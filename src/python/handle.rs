//! CompiledRule - handle to a compiled tree for the Python side
//!
//! The tree stays in Rust memory; Python only receives the record form or a
//! boolean result when it asks for one.

use pyo3::prelude::*;

use crate::rule::{evaluate, to_json, to_record, Node};

use super::convert::{json_to_py, py_to_json};

/// Immutable handle to a compiled rule
///
/// Frozen, so it can be shared across threads: the wrapped tree is never
/// mutated and its subtrees are reference counted.
#[pyclass(frozen, name = "CompiledRule")]
pub struct CompiledRule {
    node: Node,
}

impl CompiledRule {
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

#[pymethods]
impl CompiledRule {
    /// "operator" or "operand"
    #[getter]
    fn kind(&self) -> &'static str {
        self.node.kind().as_str()
    }

    /// Operator symbol or canonical condition text of the root
    #[getter]
    fn value(&self) -> String {
        self.node.value()
    }

    #[getter]
    fn depth(&self) -> usize {
        self.node.depth()
    }

    /// Sorted names of the fields this rule reads
    #[getter]
    fn fields(&self) -> Vec<String> {
        self.node.fields().into_iter().map(str::to_string).collect()
    }

    /// Evaluate against a dict of field values
    ///
    /// # Raises
    /// KeyError for a missing field, TypeError for a value of the wrong type
    fn evaluate(&self, data: &Bound<'_, PyAny>) -> PyResult<bool> {
        let data = py_to_json(data)?;
        Ok(evaluate(&self.node, &data)?)
    }

    /// Nested dict suitable for document storage
    fn to_record<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        json_to_py(py, &to_record(&self.node))
    }

    fn to_json(&self) -> String {
        to_json(&self.node)
    }

    fn __str__(&self) -> String {
        self.node.to_string()
    }

    fn __repr__(&self) -> String {
        format!("CompiledRule({:?})", self.node.to_string())
    }
}
