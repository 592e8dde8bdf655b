use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::error::StoreError;
use super::model::{
    AttendanceMark, AttendanceRecord, AttendanceSession, DatedRecord, SessionKey, Student,
};

/// Storage boundary of the attendance core.
///
/// Backends own the uniqueness rules: `insert_session` must fail with
/// [`StoreError::UniqueViolation`] when the normalized key already exists, and
/// `upsert_records` must apply every mark or none of them.
pub trait AttendanceStore {
    fn find_session(&self, key: &SessionKey) -> Result<Option<AttendanceSession>, StoreError>;

    fn insert_session(&self, session: &AttendanceSession) -> Result<(), StoreError>;

    fn get_session(&self, id: Uuid) -> Result<Option<AttendanceSession>, StoreError>;

    fn sessions_on(&self, date: NaiveDate) -> Result<Vec<AttendanceSession>, StoreError>;

    /// Ids from `ids` with no registered student, in input order.
    fn missing_students(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    fn upsert_records(
        &self,
        session_id: Uuid,
        marks: &[AttendanceMark],
        marked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn get_record(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Records of one student on sessions dated within `[from, to]`.
    fn student_records_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedRecord>, StoreError>;

    fn insert_student(&self, student: &Student) -> Result<(), StoreError>;

    /// Students ordered by display name.
    fn list_students(&self) -> Result<Vec<Student>, StoreError>;
}
