// ================================================================
// File: wavespace-common/src/error.rs
// ================================================================

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    // Validation errors. Rejected before the store is touched.
    #[error("Validation error: {0}")]
    Validation(String),

    // Business-rule outcomes.
    #[error("Insufficient balance for user {user_id}: required {required}, available {available}")]
    InsufficientBalance {
        user_id: Uuid,
        required: i64,
        available: i64,
    },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("User {user_id} already checked in on {date}")]
    AlreadyCheckedIn { user_id: Uuid, date: NaiveDate },

    #[error("User {user_id} already completed mission '{mission_id}' on {date}")]
    AlreadyCompleted {
        user_id: Uuid,
        mission_id: String,
        date: NaiveDate,
    },

    #[error("Not found error: {0}")]
    NotFound(String),

    // Concurrent-update race that survived the bounded retry loop.
    #[error("Contention: gave up after {attempts} conflicting commit attempts")]
    Contention { attempts: u32 },

    // Infrastructure errors:
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // A broken internal invariant. Retrying the same request cannot help.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    BusinessRule,
    Conflict,
    Infrastructure,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) | Error::Parse(_) => ErrorCategory::Validation,
            Error::InsufficientBalance { .. }
            | Error::InvalidRecipient(_)
            | Error::AlreadyCheckedIn { .. }
            | Error::AlreadyCompleted { .. }
            | Error::NotFound(_) => ErrorCategory::BusinessRule,
            Error::Contention { .. } => ErrorCategory::Conflict,
            _ => ErrorCategory::Infrastructure,
        }
    }

    /// True when the same request may succeed if the caller tries again later.
    pub fn is_retryable(&self) -> bool {
        match self.category() {
            ErrorCategory::Conflict => true,
            ErrorCategory::Infrastructure => {
                !matches!(self, Error::Config(_) | Error::Migration(_) | Error::Internal(_))
            }
            _ => false,
        }
    }

    /// Stable error code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) | Error::Parse(_) => "VALIDATION",
            Error::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Error::InvalidRecipient(_) => "INVALID_RECIPIENT",
            Error::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            Error::AlreadyCompleted { .. } => "ALREADY_COMPLETED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Contention { .. } => "CONTENTION",
            Error::Internal(_) => "INTERNAL",
            _ => "UNAVAILABLE",
        }
    }

    /// Text that is safe to show an end user. Infrastructure details never leak.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) | Error::Parse(msg) => format!("Invalid request: {msg}"),
            Error::InsufficientBalance { required, available, .. } => format!(
                "Not enough points: {required} required, {available} available."
            ),
            Error::InvalidRecipient(msg) => format!("Cannot send points: {msg}."),
            Error::AlreadyCheckedIn { .. } => "You have already checked in today.".to_string(),
            Error::AlreadyCompleted { .. } => {
                "You have already completed this mission today.".to_string()
            }
            Error::NotFound(what) => format!("Not found: {what}"),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
