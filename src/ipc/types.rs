use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::attendance::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub busy_timeout: Duration,
}

impl AppState {
    pub fn new(busy_timeout: Duration) -> Self {
        AppState {
            workspace: None,
            store: None,
            busy_timeout,
        }
    }
}
