use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::db::SessionConfig;
use crate::schedule::{MonthCursor, MonthlySchedule};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One member's edit buffer: the schedule collection loaded at session
/// open, mutated merge-by-merge until an explicit save commits it.
pub struct EditSession {
    pub config: SessionConfig,
    pub schedules: Vec<MonthlySchedule>,
    pub cursor: Option<MonthCursor>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<EditSession>,
}
