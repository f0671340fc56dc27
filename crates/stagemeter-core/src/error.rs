//! Shared error type across stagemeter crates.
//!
//! Stage failures are never converted into this type; they keep the stage's
//! own `Error` so hosts see exactly what the unwrapped stage would return.

use thiserror::Error;

/// Stable error codes (used by the binary exit path and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid configuration or input.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Exposition address already bound.
    AddrInUse,
    /// Instrument name registered twice.
    DuplicateInstrument,
    /// Anything else.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::AddrInUse => "ADDR_IN_USE",
            ErrorCode::DuplicateInstrument => "DUPLICATE_INSTRUMENT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, StagemeterError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum StagemeterError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("address already in use: {0}")]
    AddrInUse(String),
    #[error("instrument already registered: {0}")]
    DuplicateInstrument(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl StagemeterError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            StagemeterError::BadRequest(_) => ErrorCode::BadRequest,
            StagemeterError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            StagemeterError::AddrInUse(_) => ErrorCode::AddrInUse,
            StagemeterError::DuplicateInstrument(_) => ErrorCode::DuplicateInstrument,
            StagemeterError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Initialization errors are not recoverable; the process should exit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StagemeterError::AddrInUse(_)
                | StagemeterError::DuplicateInstrument(_)
                | StagemeterError::UnsupportedVersion
        )
    }
}
