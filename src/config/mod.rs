//! Engine configuration
//!
//! Limits applied while compiling expressions and sizing the compile cache.
//! Every field has a default, so partial JSON documents are accepted.

use crate::error::{Result, RuleError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Default maximum expression length in bytes
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 4096;

/// Default maximum parenthesis nesting depth
pub const DEFAULT_MAX_NESTING: usize = 64;

/// Default maximum rule tree depth, counting the root and the operand leaves
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default number of compiled rules held by a [`RuleCache`](crate::rule::RuleCache)
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Process-wide default configuration used by [`compile`](crate::rule::compile)
pub static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

/// Configuration for compiling and caching rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest accepted expression, in bytes
    pub max_expression_len: usize,
    /// Deepest accepted parenthesis nesting
    pub max_nesting: usize,
    /// Deepest accepted tree, whether compiled, combined or deserialized
    pub max_depth: usize,
    /// Entries kept by a compile cache before it is flushed
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
            max_nesting: DEFAULT_MAX_NESTING,
            max_depth: DEFAULT_MAX_DEPTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| RuleError::InvalidArgument(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every compile fail
    pub fn validate(&self) -> Result<()> {
        if self.max_expression_len == 0 {
            return Err(RuleError::InvalidArgument(
                "max_expression_len must be greater than zero".to_string(),
            ));
        }
        if self.max_nesting == 0 {
            return Err(RuleError::InvalidArgument(
                "max_nesting must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(RuleError::InvalidArgument(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
