//! Python bindings via PyO3

mod convert;
mod handle;

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::EngineConfig;
use crate::error::RuleError;
use crate::rule::{combine_with, evaluate, from_record_with, LogicalOp, Node, RuleCache};

use convert::py_to_json;
pub use handle::CompiledRule;

// ============================================================================
// Cached Engine State
// ============================================================================

/// Global engine state: active configuration plus the compile cache built for it
///
/// Created with the default configuration on first use.
static ENGINE: OnceCell<Arc<RwLock<RuleCache>>> = OnceCell::new();

/// Set once `init_config` has installed a configuration
static CONFIGURED: AtomicBool = AtomicBool::new(false);

fn engine() -> Arc<RwLock<RuleCache>> {
    ENGINE
        .get_or_init(|| Arc::new(RwLock::new(RuleCache::default())))
        .clone()
}

fn engine_config() -> EngineConfig {
    engine().read().config().clone()
}

// ============================================================================
// Python Functions
// ============================================================================

/// Initialize the engine configuration
///
/// Replaces the active configuration and starts a fresh compile cache.
///
/// # Arguments
/// * `config` - Optional dict with `max_expression_len`, `max_nesting`, `max_depth`,
///   `cache_capacity`
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init_config(config: Option<&Bound<'_, PyDict>>) -> PyResult<()> {
    let config = match config {
        Some(dict) => {
            let value = py_to_json(dict.as_any())?;
            let config: EngineConfig = serde_json::from_value(value).map_err(|e| {
                RuleError::InvalidArgument(format!("invalid engine config: {}", e))
            })?;
            config.validate()?;
            config
        }
        None => EngineConfig::default(),
    };

    tracing::info!(
        max_expression_len = config.max_expression_len,
        max_nesting = config.max_nesting,
        max_depth = config.max_depth,
        cache_capacity = config.cache_capacity,
        "rule engine configured"
    );

    // If already initialized, swap in the new config and an empty cache
    *engine().write() = RuleCache::new(config);
    CONFIGURED.store(true, Ordering::Release);
    Ok(())
}

/// Check if `init_config` has been called
///
/// Compiling before that works with the default configuration but does not
/// count as initialization.
#[pyfunction]
fn is_config_initialized() -> bool {
    CONFIGURED.load(Ordering::Acquire)
}

/// Install a log subscriber
///
/// `RUST_LOG` takes precedence over `level`. Returns False when a subscriber
/// was already installed.
#[pyfunction]
#[pyo3(signature = (level=None))]
fn init_logging(level: Option<&str>) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Compile a rule expression
///
/// # Raises
/// ValueError when the expression is not valid rule syntax
#[pyfunction]
fn compile_rule(expression: &str) -> PyResult<CompiledRule> {
    let engine = engine();
    let cache = engine.read();
    let node = cache.get_or_compile(expression)?;
    Ok(CompiledRule::new(node))
}

/// Combine compiled rules under one connective ("AND" or "OR")
///
/// # Raises
/// ValueError for an empty list, an unknown connective, or a result deeper
/// than the configured `max_depth`
#[pyfunction]
#[pyo3(signature = (rules, op="AND"))]
fn combine_rules(rules: Vec<PyRef<'_, CompiledRule>>, op: &str) -> PyResult<CompiledRule> {
    let op = LogicalOp::from_str(op)?;
    let nodes: Vec<Node> = rules.iter().map(|rule| rule.node().clone()).collect();
    Ok(CompiledRule::new(combine_with(&nodes, op, &engine_config())?))
}

/// Rebuild a rule from its stored record
///
/// # Raises
/// ValueError for structurally invalid records, RuntimeError for corrupted content
#[pyfunction]
fn rule_from_record(record: &Bound<'_, PyAny>) -> PyResult<CompiledRule> {
    let record = py_to_json(record)?;
    Ok(CompiledRule::new(from_record_with(&record, &engine_config())?))
}

/// Evaluate a compiled rule against a dict of field values
#[pyfunction]
fn evaluate_rule(rule: PyRef<'_, CompiledRule>, data: &Bound<'_, PyAny>) -> PyResult<bool> {
    let data = py_to_json(data)?;
    Ok(evaluate(rule.node(), &data)?)
}

/// Evaluate a compiled rule asynchronously
///
/// Runs on a blocking thread so the asyncio event loop stays responsive;
/// callers can wrap the awaitable in `asyncio.wait_for` to bound it.
///
/// # Example (Python)
/// ```python
/// rule = compile_rule("age > 30")
/// matched = await evaluate_async(rule, {"age": 35})
/// ```
#[pyfunction]
fn evaluate_async<'py>(
    py: Python<'py>,
    rule: PyRef<'py, CompiledRule>,
    data: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    // Convert while holding the GIL; the worker only touches Rust data
    let data = py_to_json(data)?;
    let node = rule.node().clone();

    pyo3_async_runtimes::tokio::future_into_py(py, async move {
        let result = tokio::task::spawn_blocking(move || evaluate(&node, &data))
            .await
            .map_err(|e| {
                PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                    "Evaluation task panicked: {}",
                    e
                ))
            })??;

        Ok(result)
    })
}

// ============================================================================
// Python Module Definition
// ============================================================================

/// Python module definition
#[pymodule]
fn rule_engine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init_config, m)?)?;
    m.add_function(wrap_pyfunction!(is_config_initialized, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(compile_rule, m)?)?;
    m.add_function(wrap_pyfunction!(combine_rules, m)?)?;
    m.add_function(wrap_pyfunction!(rule_from_record, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_async, m)?)?;
    m.add_class::<CompiledRule>()?;
    Ok(())
}
