use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use super::error::AttendanceError;

const MAX_SESSION_TYPE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionType {
    Morning,
    Evening,
    NightRoll,
    Named(String),
}

impl SessionType {
    pub fn parse(raw: &str) -> Result<Self, AttendanceError> {
        let invalid = || AttendanceError::InvalidSessionType {
            value: raw.to_string(),
        };
        match raw {
            "Morning" => return Ok(SessionType::Morning),
            "Evening" => return Ok(SessionType::Evening),
            "NightRoll" => return Ok(SessionType::NightRoll),
            _ => {}
        }
        if raw.trim().is_empty()
            || raw.trim() != raw
            || raw.chars().count() > MAX_SESSION_TYPE_LEN
            || raw.chars().any(char::is_control)
        {
            return Err(invalid());
        }
        // "morning" next to "Morning" would split one roll call into two sessions.
        if ["Morning", "Evening", "NightRoll"]
            .iter()
            .any(|b| b.eq_ignore_ascii_case(raw))
        {
            return Err(invalid());
        }
        Ok(SessionType::Named(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionType::Morning => "Morning",
            SessionType::Evening => "Evening",
            SessionType::NightRoll => "NightRoll",
            SessionType::Named(name) => name,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SessionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
    Holiday,
    Late,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Leave,
        AttendanceStatus::Holiday,
        AttendanceStatus::Late,
    ];

    pub fn parse(raw: &str) -> Result<Self, AttendanceError> {
        match raw {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Leave" | "Excused" => Ok(AttendanceStatus::Leave),
            "Holiday" => Ok(AttendanceStatus::Holiday),
            "Late" => Ok(AttendanceStatus::Late),
            _ => Err(AttendanceError::InvalidStatus {
                value: raw.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Leave => "Leave",
            AttendanceStatus::Holiday => "Holiday",
            AttendanceStatus::Late => "Late",
        }
    }

    /// Rank used when several sessions on one day disagree; higher wins.
    /// Holiday > Absent > Leave > Late > Present.
    pub fn precedence(self) -> u8 {
        match self {
            AttendanceStatus::Holiday => 4,
            AttendanceStatus::Absent => 3,
            AttendanceStatus::Leave => 2,
            AttendanceStatus::Late => 1,
            AttendanceStatus::Present => 0,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScope {
    pub block: Option<String>,
    pub room_id: Option<Uuid>,
    pub course: Option<String>,
    pub year: Option<String>,
}

fn clean_text(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl SessionScope {
    /// Trims text fields and folds blanks and the nil room into "absent".
    pub fn normalized(self) -> Self {
        SessionScope {
            block: clean_text(self.block),
            room_id: self.room_id.filter(|r| !r.is_nil()),
            course: clean_text(self.course),
            year: clean_text(self.year),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        self.block.is_none() && self.room_id.is_none() && self.course.is_none() && self.year.is_none()
    }

    pub fn covers(&self, student: &Student) -> bool {
        fn field_matches<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            match want {
                None => true,
                Some(w) => have.as_ref() == Some(w),
            }
        }
        field_matches(&self.block, &student.block)
            && field_matches(&self.room_id, &student.room_id)
            && field_matches(&self.course, &student.course)
            && field_matches(&self.year, &student.year)
    }
}

/// The normalized uniqueness tuple of a session. Absent scope fields are
/// stored as `""` and the nil UUID so the storage constraint compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub date: NaiveDate,
    pub session_type: SessionType,
    pub block: String,
    pub room_id: Uuid,
    pub course: String,
    pub year: String,
}

impl SessionKey {
    pub fn new(date: NaiveDate, session_type: SessionType, scope: SessionScope) -> Self {
        let scope = scope.normalized();
        SessionKey {
            date,
            session_type,
            block: scope.block.unwrap_or_default(),
            room_id: scope.room_id.unwrap_or_else(Uuid::nil),
            course: scope.course.unwrap_or_default(),
            year: scope.year.unwrap_or_default(),
        }
    }

    pub fn scope(&self) -> SessionScope {
        SessionScope {
            block: Some(self.block.clone()),
            room_id: Some(self.room_id),
            course: Some(self.course.clone()),
            year: Some(self.year.clone()),
        }
        .normalized()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSession {
    pub id: Uuid,
    pub date: NaiveDate,
    pub session_type: SessionType,
    pub scope: SessionScope,
    pub created_at: DateTime<Utc>,
}

impl AttendanceSession {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.date, self.session_type.clone(), self.scope.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub note: Option<String>,
    pub late_minutes: u32,
    pub updated_at: DateTime<Utc>,
}

/// One student's entry in a marking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceMark {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub note: Option<String>,
    pub late_minutes: Option<u32>,
}

impl AttendanceMark {
    pub fn new(student_id: Uuid, status: AttendanceStatus) -> Self {
        AttendanceMark {
            student_id,
            status,
            note: None,
            late_minutes: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_late_minutes(mut self, minutes: u32) -> Self {
        self.late_minutes = Some(minutes);
        self
    }

    /// Minutes only survive on a Late mark; every other status stores 0.
    pub fn effective_late_minutes(&self) -> u32 {
        match self.status {
            AttendanceStatus::Late => self.late_minutes.unwrap_or(0),
            _ => 0,
        }
    }

    pub fn effective_note(&self) -> Option<String> {
        clean_text(self.note.clone())
    }
}

/// A record joined with the date of its session, as read by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedRecord {
    pub date: NaiveDate,
    pub session_type: SessionType,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub display_name: String,
    pub block: Option<String>,
    pub room_id: Option<Uuid>,
    pub course: Option<String>,
    pub year: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub display_name: String,
    pub block: Option<String>,
    pub room_id: Option<Uuid>,
    pub course: Option<String>,
    pub year: Option<String>,
}

impl NewStudent {
    pub fn into_student(self, id: Uuid) -> Result<Student, AttendanceError> {
        let display_name = self.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AttendanceError::InvalidStudent {
                reason: "displayName must not be empty".to_string(),
            });
        }
        let scope = SessionScope {
            block: self.block,
            room_id: self.room_id,
            course: self.course,
            year: self.year,
        }
        .normalized();
        Ok(Student {
            id,
            display_name,
            block: scope.block,
            room_id: scope.room_id,
            course: scope.course,
            year: scope.year,
            active: true,
        })
    }
}
