use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::error::AttendanceError;
use super::model::{AttendanceSession, AttendanceStatus};
use super::store::AttendanceStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub present: u32,
    pub absent: u32,
    pub leave: u32,
    pub holiday: u32,
    pub late: u32,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Leave => self.leave += 1,
            AttendanceStatus::Holiday => self.holiday += 1,
            AttendanceStatus::Late => self.late += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.leave + self.holiday + self.late
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCalendar {
    pub student_id: Uuid,
    pub year: i32,
    pub month: u32,
    /// Day of month to resolved status. Unmarked days are absent from the map.
    pub days: BTreeMap<u32, AttendanceStatus>,
}

impl MonthlyCalendar {
    pub fn status_on(&self, day: u32) -> Option<AttendanceStatus> {
        self.days.get(&day).copied()
    }

    pub fn totals(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.days.values() {
            counts.add(*status);
        }
        counts
    }
}

/// Picks the single status a day shows when several sessions disagree.
pub fn resolve_day<I>(statuses: I) -> Option<AttendanceStatus>
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    statuses.into_iter().max_by_key(|s| s.precedence())
}

pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AttendanceError> {
    let invalid = || AttendanceError::InvalidMonth { month, year };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next.pred_opt().ok_or_else(invalid)?;
    Ok((first, last))
}

pub fn monthly_calendar<S>(
    store: &S,
    student_id: Uuid,
    month: u32,
    year: i32,
) -> Result<MonthlyCalendar, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let (first, last) = month_bounds(year, month)?;
    let records = store
        .student_records_between(student_id, first, last)
        .map_err(AttendanceError::store("monthly records"))?;

    let mut days: BTreeMap<u32, AttendanceStatus> = BTreeMap::new();
    for rec in records {
        let day = rec.date.day();
        let resolved = resolve_day(days.get(&day).copied().into_iter().chain([rec.status]));
        if let Some(status) = resolved {
            days.insert(day, status);
        }
    }
    tracing::debug!(%student_id, year, month, marked_days = days.len(), "monthly calendar built");
    Ok(MonthlyCalendar {
        student_id,
        year,
        month,
        days,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTally {
    pub session: AttendanceSession,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub sessions: Vec<SessionTally>,
}

impl DailySummary {
    pub fn totals(&self) -> StatusCounts {
        let mut all = StatusCounts::default();
        for t in &self.sessions {
            all.present += t.counts.present;
            all.absent += t.counts.absent;
            all.leave += t.counts.leave;
            all.holiday += t.counts.holiday;
            all.late += t.counts.late;
        }
        all
    }
}

/// Per-session status counts for every session held on `date`.
pub fn daily_summary<S>(store: &S, date: NaiveDate) -> Result<DailySummary, AttendanceError>
where
    S: AttendanceStore + ?Sized,
{
    let sessions = store
        .sessions_on(date)
        .map_err(AttendanceError::store("sessions on date"))?;
    let mut tallies = Vec::with_capacity(sessions.len());
    for session in sessions {
        let mut counts = StatusCounts::default();
        for rec in store
            .session_records(session.id)
            .map_err(AttendanceError::store("session records"))?
        {
            counts.add(rec.status);
        }
        tallies.push(SessionTally { session, counts });
    }
    Ok(DailySummary {
        date,
        sessions: tallies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::marking::mark_attendance;
    use crate::attendance::memory::MemoryStore;
    use crate::attendance::model::{NewStudent, SessionScope};
    use crate::attendance::resolver::resolve_session;
    use crate::attendance::students::register_student;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn fixture() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let student = register_student(
            &store,
            NewStudent {
                display_name: "Jones, Kai".into(),
                ..Default::default()
            },
        )
        .unwrap();
        (store, student.id)
    }

    fn mark(store: &MemoryStore, student: Uuid, date: NaiveDate, kind: &str, status: AttendanceStatus) {
        let session = resolve_session(store, date, kind, SessionScope::default()).unwrap();
        mark_attendance(store, session, student, status, None, None).unwrap();
    }

    #[test]
    fn resolve_day_prefers_exceptional_status() {
        use AttendanceStatus::*;
        assert_eq!(resolve_day([Present, Absent]), Some(Absent));
        assert_eq!(resolve_day([Holiday, Present]), Some(Holiday));
        assert_eq!(resolve_day([Present, Leave]), Some(Leave));
        assert_eq!(resolve_day([Late, Present]), Some(Late));
        assert_eq!(resolve_day([Absent, Holiday, Leave]), Some(Holiday));
        assert_eq!(resolve_day(std::iter::empty()), None);
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        assert_eq!(month_bounds(2024, 2).unwrap(), (
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        ));
        assert_eq!(month_bounds(2025, 12).unwrap().1, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(matches!(month_bounds(2025, 13), Err(AttendanceError::InvalidMonth { month: 13, .. })));
        assert!(month_bounds(2025, 0).is_err());
    }

    #[test]
    fn calendar_applies_precedence_and_omits_unmarked_days() {
        let (store, kid) = fixture();
        mark(&store, kid, day(3), "Morning", AttendanceStatus::Present);
        mark(&store, kid, day(3), "Evening", AttendanceStatus::Absent);
        mark(&store, kid, day(4), "Morning", AttendanceStatus::Present);
        mark(&store, kid, day(4), "NightRoll", AttendanceStatus::Holiday);
        mark(&store, kid, day(5), "Morning", AttendanceStatus::Present);
        mark(&store, kid, day(5), "Evening", AttendanceStatus::Leave);
        mark(&store, kid, day(6), "Morning", AttendanceStatus::Present);

        let cal = monthly_calendar(&store, kid, 3, 2025).unwrap();
        assert_eq!(cal.status_on(3), Some(AttendanceStatus::Absent));
        assert_eq!(cal.status_on(4), Some(AttendanceStatus::Holiday));
        assert_eq!(cal.status_on(5), Some(AttendanceStatus::Leave));
        assert_eq!(cal.status_on(6), Some(AttendanceStatus::Present));
        assert_eq!(cal.status_on(7), None);
        assert_eq!(cal.days.len(), 4);
        assert_eq!(cal.totals().total(), 4);
    }

    #[test]
    fn calendar_ignores_neighbouring_months() {
        let (store, kid) = fixture();
        mark(&store, kid, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(), "Morning", AttendanceStatus::Absent);
        mark(&store, kid, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), "Morning", AttendanceStatus::Absent);
        mark(&store, kid, day(31), "Morning", AttendanceStatus::Late);

        let cal = monthly_calendar(&store, kid, 3, 2025).unwrap();
        assert_eq!(cal.days.into_iter().collect::<Vec<_>>(), vec![(31, AttendanceStatus::Late)]);
    }

    #[test]
    fn empty_month_is_not_an_error() {
        let (store, kid) = fixture();
        let cal = monthly_calendar(&store, kid, 1, 2025).unwrap();
        assert!(cal.days.is_empty());
        let stranger = monthly_calendar(&store, Uuid::new_v4(), 3, 2025).unwrap();
        assert!(stranger.days.is_empty());
    }

    #[test]
    fn daily_summary_counts_each_session() {
        let (store, kid) = fixture();
        let other = register_student(
            &store,
            NewStudent {
                display_name: "Kaur, Mia".into(),
                ..Default::default()
            },
        )
        .unwrap()
        .id;
        mark(&store, kid, day(10), "Morning", AttendanceStatus::Present);
        mark(&store, other, day(10), "Morning", AttendanceStatus::Late);
        mark(&store, kid, day(10), "Evening", AttendanceStatus::Absent);
        mark(&store, kid, day(11), "Evening", AttendanceStatus::Absent);

        let summary = daily_summary(&store, day(10)).unwrap();
        assert_eq!(summary.sessions.len(), 2);
        let evening = &summary.sessions[0];
        assert_eq!(evening.session.session_type.as_str(), "Evening");
        assert_eq!(evening.counts.absent, 1);
        let morning = &summary.sessions[1];
        assert_eq!((morning.counts.present, morning.counts.late), (1, 1));
        assert_eq!(summary.totals().total(), 3);
    }
}
