use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::error::StoreError;
use super::model::{
    AttendanceMark, AttendanceRecord, AttendanceSession, AttendanceStatus, DatedRecord,
    SessionKey, SessionScope, SessionType, Student,
};
use super::store::AttendanceStore;
use crate::db;

const DATE_FMT: &str = "%Y-%m-%d";

const SESSION_COLUMNS: &str =
    "id, session_date, session_type, block, room_id, course, year, created_at";

/// SQLite-backed store. One connection per instance; concurrent callers open
/// their own store on the same workspace.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Self> {
        Ok(SqliteStore {
            conn: db::open_db(workspace, busy_timeout)?,
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(SqliteStore {
            conn: db::open_in_memory()?,
        })
    }

    pub fn count_sessions(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM attendance_sessions", [], |r| r.get(0))?)
    }

    pub fn count_records(&self, session_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE session_id = ?",
            [session_id.to_string()],
            |r| r.get(0),
        )?)
    }
}

fn parse_uuid(column: &'static str, raw: String) -> Result<Uuid, StoreError> {
    Uuid::parse_str(&raw).map_err(|_| StoreError::Corrupt { column, value: raw })
}

fn parse_date(column: &'static str, raw: String) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|_| StoreError::Corrupt { column, value: raw })
}

fn parse_timestamp(column: &'static str, raw: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt { column, value: raw })
}

fn parse_status(raw: String) -> Result<AttendanceStatus, StoreError> {
    AttendanceStatus::parse(&raw).map_err(|_| StoreError::Corrupt {
        column: "status",
        value: raw,
    })
}

fn parse_session_type(raw: String) -> Result<SessionType, StoreError> {
    SessionType::parse(&raw).map_err(|_| StoreError::Corrupt {
        column: "session_type",
        value: raw,
    })
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.is_empty())
}

struct SessionRow {
    id: String,
    date: String,
    session_type: String,
    block: String,
    room_id: String,
    course: String,
    year: String,
    created_at: String,
}

impl SessionRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SessionRow {
            id: r.get(0)?,
            date: r.get(1)?,
            session_type: r.get(2)?,
            block: r.get(3)?,
            room_id: r.get(4)?,
            course: r.get(5)?,
            year: r.get(6)?,
            created_at: r.get(7)?,
        })
    }

    fn into_session(self) -> Result<AttendanceSession, StoreError> {
        let scope = SessionScope {
            block: Some(self.block),
            room_id: Some(parse_uuid("room_id", self.room_id)?),
            course: Some(self.course),
            year: Some(self.year),
        }
        .normalized();
        Ok(AttendanceSession {
            id: parse_uuid("id", self.id)?,
            date: parse_date("session_date", self.date)?,
            session_type: parse_session_type(self.session_type)?,
            scope,
            created_at: parse_timestamp("created_at", self.created_at)?,
        })
    }
}

struct RecordRow {
    session_id: String,
    student_id: String,
    status: String,
    note: Option<String>,
    late_minutes: i64,
    updated_at: Option<String>,
}

impl RecordRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RecordRow {
            session_id: r.get(0)?,
            student_id: r.get(1)?,
            status: r.get(2)?,
            note: r.get(3)?,
            late_minutes: r.get(4)?,
            updated_at: r.get(5)?,
        })
    }

    fn into_record(self) -> Result<AttendanceRecord, StoreError> {
        let late_minutes = u32::try_from(self.late_minutes).map_err(|_| StoreError::Corrupt {
            column: "late_minutes",
            value: self.late_minutes.to_string(),
        })?;
        let updated_at = match self.updated_at {
            Some(raw) => parse_timestamp("updated_at", raw)?,
            None => DateTime::<Utc>::UNIX_EPOCH,
        };
        Ok(AttendanceRecord {
            session_id: parse_uuid("session_id", self.session_id)?,
            student_id: parse_uuid("student_id", self.student_id)?,
            status: parse_status(self.status)?,
            note: optional_text(self.note),
            late_minutes,
            updated_at,
        })
    }
}

struct StudentRow {
    id: String,
    display_name: String,
    block: Option<String>,
    room_id: Option<String>,
    course: Option<String>,
    year: Option<String>,
    active: bool,
}

impl StudentRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StudentRow {
            id: r.get(0)?,
            display_name: r.get(1)?,
            block: r.get(2)?,
            room_id: r.get(3)?,
            course: r.get(4)?,
            year: r.get(5)?,
            active: r.get::<_, i64>(6)? != 0,
        })
    }

    fn into_student(self) -> Result<Student, StoreError> {
        Ok(Student {
            id: parse_uuid("id", self.id)?,
            display_name: self.display_name,
            block: optional_text(self.block),
            room_id: self.room_id.map(|r| parse_uuid("room_id", r)).transpose()?,
            course: optional_text(self.course),
            year: optional_text(self.year),
            active: self.active,
        })
    }
}

impl AttendanceStore for SqliteStore {
    fn find_session(&self, key: &SessionKey) -> Result<Option<AttendanceSession>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM attendance_sessions
                     WHERE session_date = ? AND session_type = ?
                       AND block = ? AND room_id = ? AND course = ? AND year = ?"
                ),
                (
                    key.date.format(DATE_FMT).to_string(),
                    key.session_type.as_str(),
                    &key.block,
                    key.room_id.to_string(),
                    &key.course,
                    &key.year,
                ),
                SessionRow::read,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    fn insert_session(&self, session: &AttendanceSession) -> Result<(), StoreError> {
        let key = session.key();
        self.conn.execute(
            "INSERT INTO attendance_sessions(id, session_date, session_type, block, room_id, course, year, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                session.id.to_string(),
                key.date.format(DATE_FMT).to_string(),
                key.session_type.as_str(),
                &key.block,
                key.room_id.to_string(),
                &key.course,
                &key.year,
                session.created_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    fn get_session(&self, id: Uuid) -> Result<Option<AttendanceSession>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?"),
                [id.to_string()],
                SessionRow::read,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    fn sessions_on(&self, date: NaiveDate) -> Result<Vec<AttendanceSession>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM attendance_sessions
             WHERE session_date = ?
             ORDER BY session_type, block, room_id, course, year"
        ))?;
        let rows = stmt
            .query_map([date.format(DATE_FMT).to_string()], SessionRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    fn missing_students(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM students WHERE id = ?")?;
        let mut missing = Vec::new();
        for id in ids {
            let found = stmt
                .query_row([id.to_string()], |r| r.get::<_, i64>(0))
                .optional()?
                .is_some();
            if !found && !missing.contains(id) {
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
        // IMMEDIATE takes the write lock up front so a concurrent writer waits
        // on the busy timeout instead of failing mid-batch.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let session = session_id.to_string();
        let stamp = marked_at.to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance_records(session_id, student_id, status, note, late_minutes, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?)
                 ON CONFLICT(session_id, student_id) DO UPDATE SET
                   status = excluded.status,
                   note = excluded.note,
                   late_minutes = excluded.late_minutes,
                   updated_at = excluded.updated_at",
            )?;
            for mark in marks {
                stmt.execute((
                    &session,
                    mark.student_id.to_string(),
                    mark.status.as_str(),
                    mark.effective_note(),
                    i64::from(mark.effective_late_minutes()),
                    &stamp,
                ))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_record(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT session_id, student_id, status, note, late_minutes, updated_at
                 FROM attendance_records
                 WHERE session_id = ? AND student_id = ?",
                (session_id.to_string(), student_id.to_string()),
                RecordRow::read,
            )
            .optional()?;
        row.map(RecordRow::into_record).transpose()
    }

    fn session_records(&self, session_id: Uuid) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, student_id, status, note, late_minutes, updated_at
             FROM attendance_records
             WHERE session_id = ?",
        )?;
        let rows = stmt
            .query_map([session_id.to_string()], RecordRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    fn student_records_between(
        &self,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.session_date, s.session_type, r.status
             FROM attendance_records r
             JOIN attendance_sessions s ON s.id = r.session_id
             WHERE r.student_id = ? AND s.session_date BETWEEN ? AND ?
             ORDER BY s.session_date",
        )?;
        let rows = stmt
            .query_map(
                (
                    student_id.to_string(),
                    from.format(DATE_FMT).to_string(),
                    to.format(DATE_FMT).to_string(),
                ),
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(date, session_type, status)| {
                Ok(DatedRecord {
                    date: parse_date("session_date", date)?,
                    session_type: parse_session_type(session_type)?,
                    status: parse_status(status)?,
                })
            })
            .collect()
    }

    fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO students(id, display_name, block, room_id, course, year, active, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                student.id.to_string(),
                &student.display_name,
                &student.block,
                student.room_id.map(|r| r.to_string()),
                &student.course,
                &student.year,
                if student.active { 1 } else { 0 },
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, block, room_id, course, year, active
             FROM students
             ORDER BY display_name, id",
        )?;
        let rows = stmt
            .query_map([], StudentRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(StudentRow::into_student).collect()
    }
}
