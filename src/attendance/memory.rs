use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::error::StoreError;
use super::model::{
    AttendanceMark, AttendanceRecord, AttendanceSession, DatedRecord, SessionKey, Student,
};
use super::store::AttendanceStore;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, AttendanceSession>,
    by_key: HashMap<SessionKey, Uuid>,
    records: BTreeMap<(Uuid, Uuid), AttendanceRecord>,
    students: HashMap<Uuid, Student>,
}

/// In-process store with the same uniqueness and all-or-nothing rules as the
/// SQLite backend. Safe to share between threads.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().map(|g| g.sessions.len()).unwrap_or(0)
    }
}

impl AttendanceStore for MemoryStore {
    fn find_session(&self, key: &SessionKey) -> Result<Option<AttendanceSession>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .by_key
            .get(key)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    fn insert_session(&self, session: &AttendanceSession) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = session.key();
        if inner.by_key.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: "attendance_sessions.normalized_key".to_string(),
            });
        }
        if inner.sessions.contains_key(&session.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "attendance_sessions.id".to_string(),
            });
        }
        inner.by_key.insert(key, session.id);
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn get_session(&self, id: Uuid) -> Result<Option<AttendanceSession>, StoreError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    fn sessions_on(&self, date: NaiveDate) -> Result<Vec<AttendanceSession>, StoreError> {
        let inner = self.lock()?;
        let mut out: Vec<AttendanceSession> = inner
            .sessions
            .values()
            .filter(|s| s.date == date)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            let (ka, kb) = (a.key(), b.key());
            (ka.session_type.as_str(), &ka.block, ka.room_id, &ka.course, &ka.year).cmp(&(
                kb.session_type.as_str(),
                &kb.block,
                kb.room_id,
                &kb.course,
                &kb.year,
            ))
        });
        Ok(out)
    }

    fn missing_students(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.lock()?;
        let mut missing = Vec::new();
        for id in ids {
            if !inner.students.contains_key(id) && !missing.contains(id) {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    fn upsert_records(
        &self,
        session_id: Uuid,
        marks: &[AttendanceMark],
        marked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        // Validate the whole batch under the lock before touching anything.
        if !inner.sessions.contains_key(&session_id) {
            return Err(StoreError::MissingReference {
                column: "session_id",
                value: session_id.to_string(),
            });
        }
        if let Some(m) = marks.iter().find(|m| !inner.students.contains_key(&m.student_id)) {
            return Err(StoreError::MissingReference {
                column: "student_id",
                value: m.student_id.to_string(),
            });
        }
        for mark in marks {
            inner.records.insert(
                (session_id, mark.student_id),
                AttendanceRecord {
                    session_id,
                    student_id: mark.student_id,
                    status: mark.status,
                    note: mark.effective_note(),
                    late_minutes: mark.effective_late_minutes(),
                    updated_at: marked_at,
                },
            );
        }
        Ok(())
    }

    fn get_record(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.lock()?.records.get(&(session_id, student_id)).cloned())
    }

    fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    fn student_records_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedRecord>, StoreError> {
        let inner = self.lock()?;
        let mut out: Vec<DatedRecord> = inner
            .records
            .values()
            .filter(|r| r.student_id == student_id)
            .filter_map(|r| {
                let session = inner.sessions.get(&r.session_id)?;
                (session.date >= from && session.date <= to).then(|| DatedRecord {
                    date: session.date,
                    session_type: session.session_type.clone(),
                    status: r.status,
                })
            })
            .collect();
        out.sort_by_key(|r| r.date);
        Ok(out)
    }

    fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.students.contains_key(&student.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "students.id".to_string(),
            });
        }
        inner.students.insert(student.id, student.clone());
        Ok(())
    }

    fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut out: Vec<Student> = self.lock()?.students.values().cloned().collect();
        out.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }
}
