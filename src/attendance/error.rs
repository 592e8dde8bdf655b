use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer already holds the unique key. The resolver treats this
    /// as a lost creation race and refetches.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("{column} {value} does not reference an existing row")]
    MissingReference { column: &'static str, value: String },

    #[error("stored value in {column} is unreadable: {value:?}")]
    Corrupt { column: &'static str, value: String },

    #[error("store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref msg) = e {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return StoreError::UniqueViolation {
                    constraint: msg.clone().unwrap_or_else(|| code.to_string()),
                };
            }
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return StoreError::MissingReference {
                    column: "foreign_key",
                    value: msg.clone().unwrap_or_else(|| code.to_string()),
                };
            }
        }
        StoreError::Sqlite(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("invalid session type {value:?}")]
    InvalidSessionType { value: String },

    #[error("invalid attendance status {value:?}")]
    InvalidStatus { value: String },

    #[error("session {session_id} not found")]
    UnknownSession { session_id: Uuid },

    #[error("student {student_id} not found")]
    UnknownStudent { student_id: Uuid },

    #[error("month must be between 1 and 12 (got {month} for year {year})")]
    InvalidMonth { month: u32, year: i32 },

    #[error("invalid student: {reason}")]
    InvalidStudent { reason: String },

    #[error("attendance store unavailable during {operation}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AttendanceError {
    pub fn store(operation: &'static str) -> impl FnOnce(StoreError) -> AttendanceError {
        move |source| AttendanceError::StoreUnavailable { operation, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::InvalidSessionType { .. } => "invalid_session_type",
            AttendanceError::InvalidStatus { .. } => "invalid_status",
            AttendanceError::UnknownSession { .. } => "unknown_session",
            AttendanceError::UnknownStudent { .. } => "unknown_student",
            AttendanceError::InvalidMonth { .. } => "invalid_month",
            AttendanceError::InvalidStudent { .. } => "invalid_student",
            AttendanceError::StoreUnavailable { .. } => "store_unavailable",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AttendanceError::InvalidSessionType { value } => {
                Some(json!({ "field": "sessionType", "value": value }))
            }
            AttendanceError::InvalidStatus { value } => {
                Some(json!({ "field": "status", "value": value }))
            }
            AttendanceError::UnknownSession { session_id } => {
                Some(json!({ "field": "sessionId", "value": session_id }))
            }
            AttendanceError::UnknownStudent { student_id } => {
                Some(json!({ "field": "studentId", "value": student_id }))
            }
            AttendanceError::InvalidMonth { month, year } => {
                Some(json!({ "field": "month", "month": month, "year": year }))
            }
            AttendanceError::InvalidStudent { .. } => None,
            AttendanceError::StoreUnavailable { operation, .. } => {
                Some(json!({ "operation": operation }))
            }
        }
    }
}
