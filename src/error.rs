//! Error types for the rule engine core

#[cfg(feature = "python")]
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

/// Main error type for the rule engine core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Syntax error at position {position}: {message}{}", fragment_suffix(.fragment))]
    SyntaxError {
        message: String,
        position: usize,
        fragment: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Type mismatch on field '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Malformed node: {0}")]
    MalformedNode(String),
}

fn fragment_suffix(fragment: &str) -> String {
    if fragment.is_empty() {
        String::new()
    } else {
        format!(" (near '{}')", fragment)
    }
}

impl RuleError {
    pub(crate) fn syntax(
        message: impl Into<String>,
        position: usize,
        fragment: impl Into<String>,
    ) -> Self {
        RuleError::SyntaxError {
            message: message.into(),
            position,
            fragment: fragment.into(),
        }
    }
}

#[cfg(feature = "python")]
impl From<RuleError> for PyErr {
    fn from(err: RuleError) -> PyErr {
        let msg = err.to_string();
        match err {
            RuleError::SyntaxError { .. }
            | RuleError::InvalidArgument(_)
            | RuleError::DeserializationError(_) => PyValueError::new_err(msg),
            RuleError::MissingField(_) => PyKeyError::new_err(msg),
            RuleError::TypeMismatch { .. } => PyTypeError::new_err(msg),
            RuleError::MalformedNode(_) => PyRuntimeError::new_err(msg),
        }
    }
}

/// Result type alias for the rule engine core
pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_message() {
        let err = RuleError::syntax("unsupported comparator", 4, ">=");
        assert_eq!(
            err.to_string(),
            "Syntax error at position 4: unsupported comparator (near '>=')"
        );

        let err = RuleError::syntax("unexpected end of input", 10, "");
        assert_eq!(err.to_string(), "Syntax error at position 10: unexpected end of input");
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = RuleError::TypeMismatch {
            field: "age".to_string(),
            expected: "number",
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch on field 'age': expected number, found string"
        );
    }
}
