//! Error types for request compilation and execution.

use thiserror::Error;

/// Errors raised while compiling, executing or reconstructing a request.
#[derive(Debug, Error)]
pub enum NestError {
    /// Malformed request shape: missing table, bad `fields`, empty
    /// selection, nested joins on a write.
    #[error("{0}")]
    InvalidRequest(String),

    /// Malformed, unreadable or unwriteable field or label, or an
    /// unresolvable join path.
    #[error("{0}")]
    InvalidReference(String),

    /// Wrong value shape for a typed field.
    #[error("{0}")]
    InvalidValue(String),

    /// `limit` out of bounds.
    #[error("{0}")]
    InvalidLimit(String),

    /// `start` out of bounds.
    #[error("{0}")]
    InvalidStart(String),

    /// A single-item read or a write matched nothing.
    #[error("Could not find any results matching the query")]
    NotFound,

    /// Bad model descriptor or missing executor.
    #[error("{0}")]
    InvalidSetup(String),

    /// Error reported by the database driver, surfaced unmodified.
    #[error("{message}")]
    Driver {
        /// Driver error code, e.g. `ER_DUP_ENTRY`.
        code: String,
        /// Driver error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NestError {
    /// Returns the stable upper-snake error code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidRequest(_) | Self::Json(_) => "INVALID_REQUEST",
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::InvalidValue(_) => "INVALID_VALUE",
            Self::InvalidLimit(_) => "INVALID_LIMIT",
            Self::InvalidStart(_) => "INVALID_START",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidSetup(_) => "INVALID_SETUP",
            Self::Driver { code, .. } => code,
        }
    }

    /// Returns the HTTP-style status for this error.
    #[must_use]
    pub fn status(&self) -> u16 {
        status_for_code(self.code())
    }
}

/// Maps an error code to its status. Unknown codes map to 500.
#[must_use]
pub fn status_for_code(code: &str) -> u16 {
    match code {
        "ER_DUP_ENTRY" => 409,
        "ER_NO_DEFAULT_FOR_FIELD"
        | "INVALID_LIMIT"
        | "INVALID_REFERENCE"
        | "INVALID_REQUEST"
        | "INVALID_START"
        | "INVALID_VALUE" => 400,
        "NOT_FOUND" => 404,
        _ => 500,
    }
}

/// Result type alias for oxide-nest operations.
pub type Result<T> = std::result::Result<T, NestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(NestError::NotFound.status(), 404);
        assert_eq!(NestError::InvalidLimit("x".into()).status(), 400);
        assert_eq!(NestError::InvalidSetup("x".into()).status(), 500);
        let dup = NestError::Driver {
            code: "ER_DUP_ENTRY".into(),
            message: "Duplicate entry".into(),
        };
        assert_eq!(dup.status(), 409);
        assert_eq!(dup.code(), "ER_DUP_ENTRY");
        assert_eq!(status_for_code("ER_LOCK_DEADLOCK"), 500);
    }
}
