use http::StatusCode;
use sea_orm::error::DbErr;
use sea_orm::RuntimeErr;
use serde::Serialize;

/// PostgreSQL and SQLite error codes that signal lock contention rather than
/// a broken statement: lock_not_available, deadlock_detected,
/// serialization_failure, SQLITE_BUSY, SQLITE_LOCKED, SQLITE_BUSY_SNAPSHOT.
const CONTENTION_CODES: [&str; 6] = ["55P03", "40P01", "40001", "5", "6", "517"];

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient available quantity: {0}")]
    InsufficientAvailable(String),

    #[error("Already posted: {0}")]
    AlreadyPosted(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        ServiceError::db_error(err)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

/// Whether the driver reported lock or transaction contention.
pub fn is_lock_contention(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return false,
    };
    match runtime {
        RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db_err)) => db_err
            .code()
            .as_deref()
            .map(|code| CONTENTION_CODES.contains(&code))
            .unwrap_or(false),
        _ => false,
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    ///
    /// Lock timeouts, deadlocks and serialization failures become
    /// `ConcurrencyConflict` so callers can retry the whole operation.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        let err = error.into_db_err();
        if is_lock_contention(&err) {
            ServiceError::ConcurrencyConflict(err.to_string())
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    /// Convenience constructor for wrapping string-based database errors.
    pub fn database_error_message(message: impl Into<String>) -> Self {
        ServiceError::db_error(message.into())
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_) | Self::InsufficientAvailable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::AlreadyPosted(_)
            | Self::InvalidStateTransition(_)
            | Self::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Only lock contention is worth retrying; everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }

    /// Returns the error message suitable for callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::ConcurrencyConflict(_) => {
                "Concurrent posting in progress, retry the operation".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InsufficientAvailable("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::AlreadyPosted("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InvalidStateTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ConcurrencyConflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_concurrency_conflicts_are_retryable() {
        assert!(ServiceError::ConcurrencyConflict("busy".into()).is_retryable());
        assert!(!ServiceError::InsufficientStock("none".into()).is_retryable());
        assert!(!ServiceError::AlreadyPosted("grn".into()).is_retryable());
    }

    #[test]
    fn custom_db_errors_are_not_contention() {
        let err = ServiceError::database_error_message("boom");
        assert!(matches!(err, ServiceError::DatabaseError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("balance row vanished".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::database_error_message("syntax error").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InsufficientStock("need 5, have 2".into()).response_message(),
            "Insufficient stock: need 5, have 2"
        );
    }
}
