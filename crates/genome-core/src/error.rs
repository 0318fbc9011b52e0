use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenomeError>;

/// Engine-wide error taxonomy. Every variant maps to a stable wire code,
/// an optional recovery hint, and a driver exit code.
#[derive(Error, Debug)]
pub enum GenomeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("genome is stale: {0}")]
    Stale(String),

    #[error("contract violation [{code}]: {message}")]
    ContractViolation { code: &'static str, message: String },

    #[error("analysis failed: {message} ({} diagnostics)", diagnostics.len())]
    Analysis {
        message: String,
        diagnostics: Vec<String>,
    },

    #[error("invariant '{invariant}' violated by '{offender}': {message}")]
    Invariant {
        invariant: String,
        offender: String,
        message: String,
    },

    #[error("path not reachable: {from} -> {to}")]
    NotReachable { from: String, to: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("deadline elapsed")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,
}

impl GenomeError {
    pub fn code(&self) -> &'static str {
        match self {
            GenomeError::InvalidInput(_) => "invalid-input",
            GenomeError::NotFound(_) => "not-found",
            GenomeError::Stale(_) => "stale",
            GenomeError::ContractViolation { .. } => "contract-violation",
            GenomeError::Analysis { .. } => "analysis-error",
            GenomeError::Invariant { .. } => "invariant-violation",
            GenomeError::NotReachable { .. } => "not-reachable",
            GenomeError::Io(_) => "io-error",
            GenomeError::Json(_) => "io-error",
            GenomeError::Timeout => "timeout",
            GenomeError::Cancelled => "cancelled",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            GenomeError::Stale(_) => Some("run `scan incremental=true` to refresh the genome"),
            GenomeError::ContractViolation { .. } => {
                Some("load the `current` resource and re-run `impact`/`update` in order")
            }
            GenomeError::Invariant { .. } => {
                Some("the previous genome was retained; run `scan` to rebuild from scratch")
            }
            GenomeError::NotFound(_) => Some("run `scan` first, or check the node id"),
            GenomeError::Timeout => Some("retry with a narrower scope or a longer deadline"),
            _ => None,
        }
    }

    /// Exit code for a thin driver: 0 success, 2 invalid input, 3
    /// validation failure, 4 analysis error with partial output, 5 I/O,
    /// 64 contract violation.
    pub fn exit_code(&self) -> i32 {
        match self {
            GenomeError::InvalidInput(_) | GenomeError::NotFound(_) => 2,
            GenomeError::Stale(_) | GenomeError::Invariant { .. } => 3,
            GenomeError::Analysis { .. }
            | GenomeError::NotReachable { .. }
            | GenomeError::Timeout
            | GenomeError::Cancelled => 4,
            GenomeError::Io(_) | GenomeError::Json(_) => 5,
            GenomeError::ContractViolation { .. } => 64,
        }
    }
}

/// Wire-level error shape: stable code, human message, recovery hint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&GenomeError> for ErrorEnvelope {
    fn from(err: &GenomeError) -> Self {
        let details = match err {
            GenomeError::ContractViolation { code, .. } => {
                Some(serde_json::json!({ "code": code }))
            }
            GenomeError::Analysis { diagnostics, .. } => {
                Some(serde_json::json!({ "diagnostics": diagnostics }))
            }
            GenomeError::Invariant {
                invariant,
                offender,
                ..
            } => Some(serde_json::json!({ "invariant": invariant, "offender": offender })),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            hint: err.hint().map(str::to_string),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_driver_contract() {
        assert_eq!(GenomeError::InvalidInput("x".into()).exit_code(), 2);
        assert_eq!(GenomeError::Stale("x".into()).exit_code(), 3);
        assert_eq!(
            GenomeError::Analysis {
                message: "x".into(),
                diagnostics: vec![]
            }
            .exit_code(),
            4
        );
        assert_eq!(
            GenomeError::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")).exit_code(),
            5
        );
        assert_eq!(
            GenomeError::ContractViolation {
                code: "missing-load",
                message: "x".into()
            }
            .exit_code(),
            64
        );
    }

    #[test]
    fn envelope_carries_violation_code() {
        let err = GenomeError::ContractViolation {
            code: "missing-load",
            message: "load the genome first".into(),
        };
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.code, "contract-violation");
        assert_eq!(envelope.details.unwrap()["code"], "missing-load");
        assert!(envelope.hint.is_some());
    }
}
