use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

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

fn require_group(conn: &Connection, group_id: &str) -> Result<(), HandlerErr> {
    let exists = db::group_exists(conn, group_id).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    if !exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "group not found".to_string(),
            details: None,
        });
    }
    Ok(())
}

fn group_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let group_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO groups(id, name) VALUES(?, ?)",
        (&group_id, &name),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "groups" })),
    })?;
    Ok(json!({ "groupId": group_id, "name": name }))
}

fn group_join(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let display_name = get_required_str(params, "displayName")?;
    require_group(conn, &group_id)?;

    let token = Uuid::new_v4().to_string();
    let joined_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO members(token, group_id, display_name, joined_at)
         VALUES(?, ?, ?, ?)",
        (&token, &group_id, &display_name, &joined_at),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "members" })),
    })?;
    Ok(json!({
        "accessToken": token,
        "groupId": group_id,
        "displayName": display_name,
    }))
}

fn group_members(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    require_group(conn, &group_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT display_name, joined_at FROM members
             WHERE group_id = ?
             ORDER BY rowid",
        )
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;
    let members = stmt
        .query_map([&group_id], |r| {
            Ok(json!({
                "displayName": r.get::<_, String>(0)?,
                "joinedAt": r.get::<_, Option<String>>(1)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;
    Ok(json!({ "groupId": group_id, "members": members }))
}

fn handle_group_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match group_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_group_join(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match group_join(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_group_members(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match group_members(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "group.create" => Some(handle_group_create(state, req)),
        "group.join" => Some(handle_group_join(state, req)),
        "group.members" => Some(handle_group_members(state, req)),
        _ => None,
    }
}
