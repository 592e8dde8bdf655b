use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::error::{AttendanceError, StoreError};
use super::model::{AttendanceSession, SessionKey, SessionScope, SessionType};
use super::store::AttendanceStore;

/// Finds the session for `(date, session_type, scope)` or creates it.
///
/// Two callers racing on the same tuple both get the id of whichever insert
/// committed first: the loser sees a unique violation and refetches.
pub fn resolve_session<S>(
    store: &S,
    date: NaiveDate,
    session_type: &str,
    scope: SessionScope,
) -> Result<Uuid, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let session_type = SessionType::parse(session_type)?;
    let key = SessionKey::new(date, session_type, scope);
    resolve_key(store, &key).map(|s| s.id)
}

pub fn resolve_key<S>(store: &S, key: &SessionKey) -> Result<AttendanceSession, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    if let Some(existing) = store
        .find_session(key)
        .map_err(AttendanceError::store("find session"))?
    {
        tracing::debug!(session_id = %existing.id, date = %key.date, session_type = %key.session_type, "session reused");
        return Ok(existing);
    }

    let session = AttendanceSession {
        id: Uuid::new_v4(),
        date: key.date,
        session_type: key.session_type.clone(),
        scope: key.scope(),
        created_at: Utc::now(),
    };
    match store.insert_session(&session) {
        Ok(()) => {
            tracing::info!(session_id = %session.id, date = %key.date, session_type = %key.session_type, "session created");
            Ok(session)
        }
        Err(StoreError::UniqueViolation { constraint }) => {
            tracing::debug!(%constraint, date = %key.date, session_type = %key.session_type, "session insert raced; refetching");
            store
                .find_session(key)
                .map_err(AttendanceError::store("refetch session"))?
                .ok_or_else(|| AttendanceError::StoreUnavailable {
                    operation: "refetch session",
                    source: StoreError::UniqueViolation { constraint },
                })
        }
        Err(e) => Err(AttendanceError::store("insert session")(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::memory::MemoryStore;
    use crate::attendance::model::{
        AttendanceMark, AttendanceRecord, DatedRecord, Student,
    };
    use chrono::DateTime;
    use std::cell::Cell;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn same_tuple_resolves_to_same_session() {
        let store = MemoryStore::new();
        let a = resolve_session(&store, day(2025, 3, 1), "Morning", SessionScope::default())
            .expect("first");
        let b = resolve_session(&store, day(2025, 3, 1), "Morning", SessionScope::default())
            .expect("second");
        assert_eq!(a, b);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn blank_scope_matches_absent_scope() {
        let store = MemoryStore::new();
        let a = resolve_session(&store, day(2025, 3, 1), "Evening", SessionScope::default())
            .unwrap();
        let b = resolve_session(
            &store,
            day(2025, 3, 1),
            "Evening",
            SessionScope {
                block: Some(" ".into()),
                room_id: Some(Uuid::nil()),
                course: Some(String::new()),
                year: None,
            },
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scope_and_type_distinguish_sessions() {
        let store = MemoryStore::new();
        let date = day(2025, 3, 1);
        let morning = resolve_session(&store, date, "Morning", SessionScope::default()).unwrap();
        let evening = resolve_session(&store, date, "Evening", SessionScope::default()).unwrap();
        let block_a = resolve_session(
            &store,
            date,
            "Morning",
            SessionScope {
                block: Some("A".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(morning, evening);
        assert_ne!(morning, block_a);
        assert_eq!(store.session_count(), 3);
    }

    #[test]
    fn invalid_session_type_creates_nothing() {
        let store = MemoryStore::new();
        let err = resolve_session(&store, day(2025, 3, 1), "", SessionScope::default())
            .expect_err("empty type");
        assert!(matches!(err, AttendanceError::InvalidSessionType { .. }));
        assert_eq!(store.session_count(), 0);
    }

    /// Hides the first lookup so the resolver tries to insert a session that
    /// another caller already committed.
    struct LateLookup {
        inner: MemoryStore,
        hide_next_find: Cell<bool>,
    }

    impl AttendanceStore for LateLookup {
        fn find_session(&self, key: &SessionKey) -> Result<Option<AttendanceSession>, StoreError> {
            if self.hide_next_find.replace(false) {
                return Ok(None);
            }
            self.inner.find_session(key)
        }
        fn insert_session(&self, session: &AttendanceSession) -> Result<(), StoreError> {
            self.inner.insert_session(session)
        }
        fn get_session(&self, id: Uuid) -> Result<Option<AttendanceSession>, StoreError> {
            self.inner.get_session(id)
        }
        fn sessions_on(&self, date: NaiveDate) -> Result<Vec<AttendanceSession>, StoreError> {
            self.inner.sessions_on(date)
        }
        fn missing_students(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
            self.inner.missing_students(ids)
        }
        fn upsert_records(
            &self,
            session_id: Uuid,
            marks: &[AttendanceMark],
            marked_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.upsert_records(session_id, marks, marked_at)
        }
        fn get_record(
            &self,
            session_id: Uuid,
            student_id: Uuid,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            self.inner.get_record(session_id, student_id)
        }
        fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
            self.inner.session_records(session_id)
        }
        fn student_records_between(
            &self,
            student_id: Uuid,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<DatedRecord>, StoreError> {
            self.inner.student_records_between(student_id, from, to)
        }
        fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
            self.inner.insert_student(student)
        }
        fn list_students(&self) -> Result<Vec<Student>, StoreError> {
            self.inner.list_students()
        }
    }

    #[test]
    fn lost_insert_race_returns_winner() {
        let store = LateLookup {
            inner: MemoryStore::new(),
            hide_next_find: Cell::new(false),
        };
        let winner =
            resolve_session(&store, day(2025, 3, 2), "NightRoll", SessionScope::default()).unwrap();

        store.hide_next_find.set(true);
        let loser =
            resolve_session(&store, day(2025, 3, 2), "NightRoll", SessionScope::default()).unwrap();

        assert_eq!(winner, loser);
        assert_eq!(store.inner.session_count(), 1);
        assert!(!store.hide_next_find.get());
    }
}
