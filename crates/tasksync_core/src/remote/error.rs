//! Remote store failure taxonomy.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by the remote collection.
///
/// Every variant keeps the remote-assigned code so it can be logged as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network or availability problem. Retryable by the caller.
    Transient { code: String, message: String },
    /// Authorization failure. Not retryable without re-authentication.
    Permission { code: String, message: String },
    /// Target record no longer exists.
    NotFound { code: String, message: String },
    /// Anything the engine does not interpret further.
    Other { code: String, message: String },
}

impl StoreError {
    /// Classifies a remote error code into one of the engine categories.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        match code.as_str() {
            "unavailable" | "deadline-exceeded" | "aborted" | "resource-exhausted" => {
                Self::Transient { code, message }
            }
            "permission-denied" | "unauthenticated" => Self::Permission { code, message },
            "not-found" => Self::NotFound { code, message },
            _ => Self::Other { code, message },
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::from_code("unavailable", message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::from_code("permission-denied", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_code("not-found", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::from_code("internal", message)
    }

    /// Stable category name used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Permission { .. } => "permission",
            Self::NotFound { .. } => "not_found",
            Self::Other { .. } => "other",
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Transient { code, .. }
            | Self::Permission { code, .. }
            | Self::NotFound { code, .. }
            | Self::Other { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. }
            | Self::Permission { message, .. }
            | Self::NotFound { message, .. }
            | Self::Other { message, .. } => message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} store error ({}): {}",
            self.category(),
            self.code(),
            self.message()
        )
    }
}

impl Error for StoreError {}
