use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, EditSession, Request};
use crate::schedule::{
    bulk_apply, default_availabilities, find_schedule, merge_schedule, month_cursor, toggle_day,
    Availability, DayFilter, MonthCursor, MonthlySchedule,
};
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

fn require_cursor(session: &EditSession) -> Result<MonthCursor, HandlerErr> {
    session.cursor.ok_or_else(|| HandlerErr {
        code: "no_cursor",
        message: "open a month first".to_string(),
        details: None,
    })
}

fn parse_value(params: &serde_json::Value) -> Result<Availability, HandlerErr> {
    let raw = params
        .get("value")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing value".to_string(),
            details: None,
        })?;
    Availability::parse(raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown availability code: {}", raw),
        details: None,
    })
}

/// The visible sequence is always re-derived from the collection; the
/// shell never holds the authoritative copy.
fn current_selections(
    session: &EditSession,
    cursor: MonthCursor,
) -> Result<Vec<Availability>, HandlerErr> {
    find_schedule(&session.schedules, cursor.year, cursor.month)
        .map(|s| s.availabilities.clone())
        .or_else(|| default_availabilities(cursor.year, cursor.month))
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "month out of range".to_string(),
            details: None,
        })
}

fn view_result(cursor: MonthCursor, selections: &[Availability]) -> serde_json::Value {
    json!({
        "year": cursor.year,
        "month": cursor.month,
        "daysInMonth": cursor.days,
        "startWeekday": cursor.start_weekday,
        "selections": serde_json::to_value(selections).unwrap_or_else(|_| json!([])),
    })
}

fn calendar_open(
    session: &mut EditSession,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let raw_offset = params
        .get("monthOffset")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let offset = i32::try_from(raw_offset).map_err(|_| HandlerErr {
        code: "bad_params",
        message: "monthOffset out of range".to_string(),
        details: None,
    })?;

    let today = chrono::Local::now().date_naive();
    let cursor = month_cursor(today, offset).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: "monthOffset out of range".to_string(),
        details: None,
    })?;
    session.cursor = Some(cursor);

    let selections = current_selections(session, cursor)?;
    Ok(view_result(cursor, &selections))
}

fn calendar_set_day(
    session: &mut EditSession,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let cursor = require_cursor(session)?;
    let day_index = params
        .get("dayIndex")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing dayIndex".to_string(),
            details: None,
        })? as usize;
    let value = parse_value(params)?;

    let selections = current_selections(session, cursor)?;
    let updated = toggle_day(&selections, day_index, value).map_err(|e| HandlerErr {
        code: "bad_params",
        message: e.message,
        details: Some(json!({ "code": e.code })),
    })?;

    session.schedules = merge_schedule(
        &session.schedules,
        &MonthlySchedule {
            year: cursor.year,
            month: cursor.month,
            availabilities: updated.clone(),
        },
    );
    Ok(view_result(cursor, &updated))
}

fn calendar_bulk_apply(
    session: &mut EditSession,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let cursor = require_cursor(session)?;
    let day = params.get("day").and_then(|v| v.as_str()).unwrap_or("-");
    let filter = DayFilter::parse(day).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown weekday filter: {}", day),
        details: None,
    })?;
    let value = parse_value(params)?;

    let selections = current_selections(session, cursor)?;
    let updated = bulk_apply(&selections, cursor.start_weekday, filter, value);

    session.schedules = merge_schedule(
        &session.schedules,
        &MonthlySchedule {
            year: cursor.year,
            month: cursor.month,
            availabilities: updated.clone(),
        },
    );
    Ok(view_result(cursor, &updated))
}

fn handle_calendar_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    match calendar_open(session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_calendar_set_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    match calendar_set_day(session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_calendar_bulk_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "open a session first", None);
    };
    match calendar_bulk_apply(session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.open" => Some(handle_calendar_open(state, req)),
        "calendar.setDay" => Some(handle_calendar_set_day(state, req)),
        "calendar.bulkApply" => Some(handle_calendar_bulk_apply(state, req)),
        _ => None,
    }
}
