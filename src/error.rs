// =============================================================================
// Typed engine error kinds
// =============================================================================
//
// The exchange client and store still return `anyhow::Result` for ad-hoc I/O
// context chaining (matching the source's style), but every error that can
// reach an operator-facing surface (a BotLog row, a System Error record, a
// start/close rejection) is first normalized into one of these kinds so the
// caller can match on it instead of grepping a message string.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("credentials missing for {0}")]
    CredentialsMissing(String),

    #[error("exchange rejected request: {code} {msg}")]
    ExchangeRejected { code: i64, msg: String },

    #[error("network timeout: {0}")]
    NetworkTimeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("advisor unavailable: {0}")]
    AdvisorUnavailable(String),

    #[error("bot already running")]
    AlreadyRunning,

    #[error("bot not running")]
    NotRunning,

    #[error("position already closed")]
    AlreadyClosed,

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("position cap reached ({0} open)")]
    CapReached(usize),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),
}

impl EngineError {
    /// Machine-readable code surfaced to the operator alongside the message,
    /// matching the kind names used in the error-handling design (not the
    /// variant's Rust identifier, which may carry payload fields).
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "ValidationError",
            Self::CredentialsMissing(_) => "CredentialsMissing",
            Self::ExchangeRejected { .. } => "ExchangeRejected",
            Self::NetworkTimeout(_) => "NetworkTimeout",
            Self::RateLimited(_) => "RateLimited",
            Self::DataUnavailable(_) => "DataUnavailable",
            Self::AdvisorUnavailable(_) => "AdvisorUnavailable",
            Self::AlreadyRunning => "AlreadyRunning",
            Self::NotRunning => "NotRunning",
            Self::AlreadyClosed => "AlreadyClosed",
            Self::InsufficientBalance(_) => "InsufficientBalance",
            Self::CapReached(_) => "CapReached",
            Self::StorageError(_) => "StorageError",
            Self::ProtocolError(_) => "ProtocolError",
        }
    }

    /// Whether this kind represents a normal business outcome (admission
    /// gate rejections) rather than a fault, per the propagation policy:
    /// these log at INFO instead of WARN/ERROR.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance(_) | Self::CapReached(_) | Self::ValidationError(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_spec_kind_names() {
        assert_eq!(EngineError::AlreadyRunning.code(), "AlreadyRunning");
        assert_eq!(
            EngineError::ExchangeRejected { code: 10001, msg: "bad".into() }.code(),
            "ExchangeRejected"
        );
        assert_eq!(EngineError::CapReached(3).code(), "CapReached");
    }

    #[test]
    fn admission_rejections_are_flagged() {
        assert!(EngineError::CapReached(3).is_admission_rejection());
        assert!(EngineError::InsufficientBalance("x".into()).is_admission_rejection());
        assert!(!EngineError::StorageError("x".into()).is_admission_rejection());
    }
}
