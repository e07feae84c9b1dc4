use crate::db;
use crate::db::SessionConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, EditSession, Request};
use rusqlite::Connection;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn session_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(EditSession, serde_json::Value), HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let access_token = get_required_str(params, "accessToken")?;

    let group_exists = db::group_exists(conn, &group_id).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    if !group_exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "group not found".to_string(),
            details: None,
        });
    }

    let config = SessionConfig {
        access_token,
        group_id,
    };
    let display_name = db::member_display_name(conn, &config)
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?
        .ok_or_else(|| HandlerErr {
            code: "auth_failed",
            message: "access token is not a member of this group".to_string(),
            details: None,
        })?;

    let schedules = db::load_schedules(conn, &config).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;

    let result = json!({
        "groupId": config.group_id,
        "displayName": display_name,
        "monthCount": schedules.len(),
        "schedules": serde_json::to_value(&schedules).unwrap_or_else(|_| json!([])),
    });
    let session = EditSession {
        config,
        schedules,
        cursor: None,
    };
    Ok((session, result))
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match session_open(conn, &req.params) {
        Ok((session, result)) => {
            state.session = Some(session);
            ok(&req.id, result)
        }
        Err(error) => error.response(&req.id),
    }
}

fn handle_schedule_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "open a session first", None);
    };

    // Membership can disappear under us (e.g. a restored backup). Surface
    // that as an auth failure, not a blind db error.
    match db::member_display_name(conn, &session.config) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return err(
                &req.id,
                "auth_failed",
                "access token is not a member of this group",
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    // On failure the in-memory collection stays as edited; only the saved
    // confirmation is withheld.
    match db::save_schedules(conn, &session.config, &session.schedules) {
        Ok(()) => ok(
            &req.id,
            json!({ "saved": true, "monthCount": session.schedules.len() }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "schedule save failed");
            err(&req.id, "save_failed", e.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.open" => Some(handle_session_open(state, req)),
        "schedule.save" => Some(handle_schedule_save(state, req)),
        _ => None,
    }
}
