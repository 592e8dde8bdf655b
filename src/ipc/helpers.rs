use chrono::NaiveDate;
use uuid::Uuid;

use super::error::HandlerErr;
use super::types::AppState;
use crate::attendance::SqliteStore;

pub fn require_store(state: &AppState) -> Result<&SqliteStore, HandlerErr> {
    state.store.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Missing, null and blank strings all read as `None`.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key)))?;
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
    }
}

pub fn parse_uuid(key: &str, raw: &str) -> Result<Uuid, HandlerErr> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a UUID", key)))
}

pub fn get_required_uuid(params: &serde_json::Value, key: &str) -> Result<Uuid, HandlerErr> {
    parse_uuid(key, &get_required_str(params, key)?)
}

pub fn get_optional_uuid(params: &serde_json::Value, key: &str) -> Result<Option<Uuid>, HandlerErr> {
    get_optional_str(params, key)?
        .map(|s| parse_uuid(key, &s))
        .transpose()
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_required_u64(params: &serde_json::Value, key: &str) -> Result<u64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_u32(params: &serde_json::Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("{} must be a non-negative integer", key))
            }),
    }
}
