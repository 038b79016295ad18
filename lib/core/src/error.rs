use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::value::FieldType;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user transformations and lookup backends
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema mismatch in {context}: {}", mismatch_summary(.missing, .mismatched, .unexpected))]
    SchemaMismatch {
        context: String,
        missing: Vec<String>,
        mismatched: Vec<FieldMismatch>,
        unexpected: Vec<String>,
    },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Transformation '{view}' failed in {mode} mode: {source}")]
    TransformationExecution {
        view: String,
        mode: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Lookup for source '{source_name}' timed out after {timeout:?}")]
    LookupTimeout { source_name: String, timeout: Duration },

    #[error("Lookup for source '{source_name}' failed: {message}")]
    Lookup { source_name: String, message: String },

    #[error("{owner} references undeclared {kind} '{name}'")]
    MissingDependency {
        owner: String,
        kind: &'static str,
        name: String,
    },

    #[error("Feature view '{0}' must declare at least one source")]
    NoSources(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether a caller may retry the same request with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LookupTimeout { .. } | Error::Lookup { .. })
    }

    pub(crate) fn mismatch(
        context: impl Into<String>,
        missing: Vec<String>,
        mismatched: Vec<FieldMismatch>,
        unexpected: Vec<String>,
    ) -> Self {
        Error::SchemaMismatch {
            context: context.into(),
            missing,
            mismatched,
            unexpected,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// A field whose value does not fit its declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: FieldType,
    pub actual: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expected {}, got {})", self.field, self.expected, self.actual)
    }
}

fn mismatch_summary(missing: &[String], mismatched: &[FieldMismatch], unexpected: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join(", ")));
    }
    if !mismatched.is_empty() {
        let items: Vec<String> = mismatched.iter().map(|m| m.to_string()).collect();
        parts.push(format!("mismatched [{}]", items.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected [{}]", unexpected.join(", ")));
    }
    if parts.is_empty() {
        "invalid shape".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_mismatch_message_lists_fields() {
        let err = Error::mismatch(
            "source 'transaction_request'",
            vec!["amount".to_string()],
            vec![FieldMismatch {
                field: "user_id".to_string(),
                expected: FieldType::String,
                actual: "int64".to_string(),
            }],
            vec![],
        );
        let msg = err.to_string();
        assert!(msg.contains("missing [amount]"));
        assert!(msg.contains("user_id (expected string, got int64)"));
        assert!(!msg.contains("unexpected"));
    }

    #[test]
    fn test_transformation_error_keeps_cause() {
        let cause: BoxError = "division by zero".into();
        let err = Error::TransformationExecution {
            view: "ratio".to_string(),
            mode: "online",
            source: cause,
        };
        assert_eq!(err.source().unwrap().to_string(), "division by zero");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        let timeout = Error::LookupTimeout {
            source_name: "user_transaction_metrics".to_string(),
            timeout: Duration::from_millis(50),
        };
        assert!(timeout.is_retryable());
        assert!(!Error::NoSources("v".to_string()).is_retryable());
    }
}
