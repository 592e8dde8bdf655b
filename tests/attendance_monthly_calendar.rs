use chrono::NaiveDate;
use hosteld::attendance::{
    daily_summary, mark_attendance, monthly_calendar, register_student, resolve_session,
    AttendanceStatus, NewStudent, SessionScope, SqliteStore,
};
use uuid::Uuid;

fn setup() -> (SqliteStore, Uuid) {
    let store = SqliteStore::open_in_memory().unwrap();
    let kid = register_student(
        &store,
        NewStudent {
            display_name: "Hart, Noa".into(),
            block: Some("East".into()),
            ..Default::default()
        },
    )
    .unwrap()
    .id;
    (store, kid)
}

fn mark_on(store: &SqliteStore, kid: Uuid, ymd: (i32, u32, u32), kind: &str, status: AttendanceStatus) {
    let date = NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap();
    let session = resolve_session(store, date, kind, SessionScope::default()).unwrap();
    mark_attendance(store, session, kid, status, None, None).unwrap();
}

#[test]
fn precedence_resolves_conflicting_sessions() {
    let (store, kid) = setup();
    mark_on(&store, kid, (2025, 3, 3), "Morning", AttendanceStatus::Present);
    mark_on(&store, kid, (2025, 3, 3), "Evening", AttendanceStatus::Absent);
    mark_on(&store, kid, (2025, 3, 4), "Morning", AttendanceStatus::Holiday);
    mark_on(&store, kid, (2025, 3, 4), "Evening", AttendanceStatus::Present);
    mark_on(&store, kid, (2025, 3, 5), "Morning", AttendanceStatus::Present);
    mark_on(&store, kid, (2025, 3, 5), "NightRoll", AttendanceStatus::Leave);

    let cal = monthly_calendar(&store, kid, 3, 2025).unwrap();
    assert_eq!(cal.status_on(3), Some(AttendanceStatus::Absent));
    assert_eq!(cal.status_on(4), Some(AttendanceStatus::Holiday));
    assert_eq!(cal.status_on(5), Some(AttendanceStatus::Leave));
    assert_eq!(cal.status_on(6), None);
    assert_eq!(cal.days.len(), 3);
}

#[test]
fn calendar_only_reads_the_requested_month_and_student() {
    let (store, kid) = setup();
    let other = register_student(
        &store,
        NewStudent {
            display_name: "Ives, Jo".into(),
            ..Default::default()
        },
    )
    .unwrap()
    .id;
    mark_on(&store, kid, (2024, 2, 29), "Morning", AttendanceStatus::Absent);
    mark_on(&store, kid, (2024, 3, 1), "Morning", AttendanceStatus::Absent);
    mark_on(&store, kid, (2024, 2, 1), "Morning", AttendanceStatus::Present);
    mark_on(&store, other, (2024, 2, 10), "Morning", AttendanceStatus::Absent);

    let cal = monthly_calendar(&store, kid, 2, 2024).unwrap();
    let days: Vec<(u32, AttendanceStatus)> = cal.days.into_iter().collect();
    assert_eq!(
        days,
        vec![(1, AttendanceStatus::Present), (29, AttendanceStatus::Absent)]
    );
}

#[test]
fn empty_or_invalid_months() {
    let (store, kid) = setup();
    assert!(monthly_calendar(&store, kid, 7, 2025).unwrap().days.is_empty());
    let err = monthly_calendar(&store, kid, 0, 2025).unwrap_err();
    assert_eq!(err.code(), "invalid_month");
}

#[test]
fn day_summary_tallies_sessions() {
    let (store, kid) = setup();
    mark_on(&store, kid, (2025, 3, 3), "Morning", AttendanceStatus::Late);
    mark_on(&store, kid, (2025, 3, 3), "Evening", AttendanceStatus::Present);
    let summary = daily_summary(&store, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()).unwrap();
    assert_eq!(summary.sessions.len(), 2);
    let totals = summary.totals();
    assert_eq!((totals.late, totals.present, totals.total()), (1, 1, 2));
    let empty = daily_summary(&store, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()).unwrap();
    assert!(empty.sessions.is_empty());
}
