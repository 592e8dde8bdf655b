use crate::attendance::{
    self, AttendanceMark, AttendanceStatus, SessionScope, SqliteStore,
};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_optional_u32, get_optional_uuid, get_required_date, get_required_str,
    get_required_u64, get_required_uuid, require_store,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn parse_mark(params: &serde_json::Value) -> Result<AttendanceMark, HandlerErr> {
    let student_id = get_required_uuid(params, "studentId")?;
    let status = AttendanceStatus::parse(&get_required_str(params, "status")?)?;
    Ok(AttendanceMark {
        student_id,
        status,
        note: get_optional_str(params, "note")?,
        late_minutes: get_optional_u32(params, "lateMinutes")?,
    })
}

fn resolve_session(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let session_type = get_required_str(params, "sessionType")?;
    let scope = SessionScope {
        block: get_optional_str(params, "block")?,
        room_id: get_optional_uuid(params, "roomId")?,
        course: get_optional_str(params, "course")?,
        year: get_optional_str(params, "year")?,
    };
    let session_id = attendance::resolve_session(store, date, &session_type, scope)?;
    Ok(json!({ "sessionId": session_id }))
}

fn mark(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_uuid(params, "sessionId")?;
    let m = parse_mark(params)?;
    attendance::mark_attendance(store, session_id, m.student_id, m.status, m.note, m.late_minutes)?;
    let record = attendance::get_record(store, session_id, m.student_id)?;
    Ok(json!({ "record": record }))
}

fn mark_bulk(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_uuid(params, "sessionId")?;
    let Some(items) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing records"));
    };
    // Parse everything first: one bad entry rejects the whole submission.
    let mut marks = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let m = parse_mark(item).map_err(|mut e| {
            e.details = Some(json!({ "index": idx, "cause": e.details.take() }));
            e
        })?;
        marks.push(m);
    }
    attendance::mark_attendance_bulk(store, session_id, &marks)?;
    Ok(json!({ "marked": marks.len() }))
}

fn roster(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_uuid(params, "sessionId")?;
    let entries = attendance::session_roster(store, session_id)?;
    Ok(json!({ "sessionId": session_id, "entries": entries }))
}

fn monthly_calendar(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_uuid(params, "studentId")?;
    let month = u32::try_from(get_required_u64(params, "month")?)
        .map_err(|_| HandlerErr::bad_params("month out of range"))?;
    let year = params
        .get("year")
        .and_then(|v| v.as_i64())
        .and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| HandlerErr::bad_params("missing year"))?;
    let cal = attendance::monthly_calendar(store, student_id, month, year)?;
    // JSON object keys are strings; the day number is kept as its decimal form.
    let days: serde_json::Map<String, serde_json::Value> = cal
        .days
        .iter()
        .map(|(d, s)| (d.to_string(), json!(s.as_str())))
        .collect();
    Ok(json!({
        "studentId": cal.student_id,
        "year": cal.year,
        "month": cal.month,
        "days": days,
        "totals": cal.totals(),
    }))
}

fn day_summary(store: &SqliteStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let summary = attendance::daily_summary(store, date)?;
    Ok(json!({
        "date": summary.date,
        "sessions": summary.sessions,
        "totals": summary.totals(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: fn(&SqliteStore, &serde_json::Value) -> Result<serde_json::Value, HandlerErr> =
        match req.method.as_str() {
            "attendance.resolveSession" => resolve_session,
            "attendance.mark" => mark,
            "attendance.markBulk" => mark_bulk,
            "attendance.roster" => roster,
            "attendance.monthlyCalendar" => monthly_calendar,
            "attendance.daySummary" => day_summary,
            _ => return None,
        };
    let result = require_store(state).and_then(|store| op(store, &req.params));
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
