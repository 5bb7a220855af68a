//! Compile cache - expression text to compiled tree, with fast hashing

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::rule::ast::Node;
use crate::rule::parser::compile_with;

/// Caller-owned cache of compiled rules
///
/// Compiling stays pure; this only saves re-parsing expressions that are
/// compiled repeatedly. Cached trees are cheap to clone because their
/// subtrees are shared.
#[derive(Debug)]
pub struct RuleCache {
    config: EngineConfig,
    entries: RwLock<AHashMap<String, Node>>,
}

impl RuleCache {
    pub fn new(config: EngineConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            config,
            entries: RwLock::new(AHashMap::with_capacity(capacity)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get or compile an expression, caching successful compiles
    #[inline]
    pub fn get_or_compile(&self, expression: &str) -> Result<Node> {
        // Fast path: read lock
        {
            let entries = self.entries.read();
            if let Some(node) = entries.get(expression) {
                tracing::trace!(expression, "rule cache hit");
                return Ok(node.clone());
            }
        }

        // Slow path: compile outside any lock, then insert
        let node = compile_with(expression, &self.config)?;

        if self.config.cache_capacity > 0 {
            let mut entries = self.entries.write();
            if entries.len() >= self.config.cache_capacity {
                tracing::warn!(entries = entries.len(), "rule cache full, flushing");
                entries.clear();
            }
            entries.insert(expression.to_string(), node.clone());
        }

        Ok(node)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
