use crate::attendance::{self, NewStudent};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_optional_uuid, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn students_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let new = NewStudent {
        display_name: get_required_str(params, "displayName")?,
        block: get_optional_str(params, "block")?,
        room_id: get_optional_uuid(params, "roomId")?,
        course: get_optional_str(params, "course")?,
        year: get_optional_str(params, "year")?,
    };
    let student = attendance::register_student(store, new)?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let students = attendance::list_students(store)?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => students_create(state, &req.params),
        "students.list" => students_list(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
