//! Attendance sessions and per-student records.
//!
//! Sessions are resolved (found or created once) from a date, a session type
//! and an optional scope; records are upserted per (session, student); the
//! aggregator folds a student's records into one status per calendar day.

pub mod aggregate;
pub mod error;
pub mod marking;
pub mod memory;
pub mod model;
pub mod resolver;
pub mod sqlite;
pub mod store;
pub mod students;

pub use aggregate::{daily_summary, monthly_calendar, DailySummary, MonthlyCalendar, StatusCounts};
pub use error::{AttendanceError, StoreError};
pub use marking::{get_record, mark_attendance, mark_attendance_bulk, session_roster, RosterEntry};
pub use memory::MemoryStore;
pub use model::{
    AttendanceMark, AttendanceRecord, AttendanceSession, AttendanceStatus, NewStudent,
    SessionScope, SessionType, Student,
};
pub use resolver::resolve_session;
pub use sqlite::SqliteStore;
pub use store::AttendanceStore;
pub use students::{list_students, register_student};
