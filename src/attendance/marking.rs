use chrono::Utc;
use uuid::Uuid;

use super::error::AttendanceError;
use super::model::{AttendanceMark, AttendanceRecord, AttendanceSession, AttendanceStatus, Student};
use super::store::AttendanceStore;

pub fn mark_attendance<S>(
    store: &S,
    session_id: Uuid,
    student_id: Uuid,
    status: AttendanceStatus,
    note: Option<String>,
    late_minutes: Option<u32>,
) -> Result<(), AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let mark = AttendanceMark {
        student_id,
        status,
        note,
        late_minutes,
    };
    mark_attendance_bulk(store, session_id, std::slice::from_ref(&mark))
}

/// Writes every mark or none. Unknown students are reported before anything
/// is written; the store applies the batch in one transaction.
pub fn mark_attendance_bulk<S>(
    store: &S,
    session_id: Uuid,
    marks: &[AttendanceMark],
) -> Result<(), AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    require_session(store, session_id)?;
    if marks.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = marks.iter().map(|m| m.student_id).collect();
    let missing = store
        .missing_students(&ids)
        .map_err(AttendanceError::store("check students"))?;
    if let Some(student_id) = missing.first() {
        tracing::warn!(%session_id, %student_id, batch = marks.len(), "rejecting marks for unknown student");
        return Err(AttendanceError::UnknownStudent {
            student_id: *student_id,
        });
    }

    store
        .upsert_records(session_id, marks, Utc::now())
        .map_err(AttendanceError::store("upsert records"))?;
    tracing::info!(%session_id, count = marks.len(), "attendance marked");
    Ok(())
}

pub fn get_record<S>(
    store: &S,
    session_id: Uuid,
    student_id: Uuid,
) -> Result<Option<AttendanceRecord>, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    store
        .get_record(session_id, student_id)
        .map_err(AttendanceError::store("get record"))
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student: Student,
    pub record: Option<AttendanceRecord>,
}

/// Students covered by the session's scope, each with its current record.
/// Students marked on the session but outside its scope are listed too.
pub fn session_roster<S>(store: &S, session_id: Uuid) -> Result<Vec<RosterEntry>, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let session = require_session(store, session_id)?;
    let students = store
        .list_students()
        .map_err(AttendanceError::store("list students"))?;
    let mut records = store
        .session_records(session_id)
        .map_err(AttendanceError::store("session records"))?;

    let mut roster = Vec::new();
    for student in students {
        let idx = records.iter().position(|r| r.student_id == student.id);
        let record = idx.map(|i| records.swap_remove(i));
        let in_scope = student.active && session.scope.covers(&student);
        if in_scope || record.is_some() {
            roster.push(RosterEntry { student, record });
        }
    }
    Ok(roster)
}

pub(crate) fn require_session<S>(
    store: &S,
    session_id: Uuid,
) -> Result<AttendanceSession, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    store
        .get_session(session_id)
        .map_err(AttendanceError::store("get session"))?
        .ok_or(AttendanceError::UnknownSession { session_id })
}
