use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_availd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn availd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn month_key(view: &serde_json::Value) -> (i64, i64) {
    (
        view.get("year").and_then(|v| v.as_i64()).expect("year"),
        view.get("month").and_then(|v| v.as_i64()).expect("month"),
    )
}

fn schedule_codes(result: &serde_json::Value, year: i64, month: i64) -> Vec<String> {
    let schedules = result
        .get("schedules")
        .and_then(|v| v.as_array())
        .expect("schedules array");
    let entry = schedules
        .iter()
        .find(|s| {
            s.get("year").and_then(|v| v.as_i64()) == Some(year)
                && s.get("month").and_then(|v| v.as_i64()) == Some(month)
        })
        .unwrap_or_else(|| panic!("no schedule for {}-{}", year, month));
    entry
        .get("availabilities")
        .and_then(|v| v.as_array())
        .expect("availabilities array")
        .iter()
        .map(|v| v.as_str().expect("code").to_string())
        .collect()
}

#[test]
fn save_commits_whole_collection_and_reload_preserves_it() {
    let workspace = temp_dir("availd-save-roundtrip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Saving with no session open is an ordering error.
    let early = request(&mut stdin, &mut reader, "e1", "schedule.save", json!({}));
    assert_eq!(
        early
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str()),
        Some("no_session")
    );

    let group = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "group.create",
        json!({ "name": "Futsal" }),
    );
    let group_id = group
        .get("groupId")
        .and_then(|v| v.as_str())
        .expect("groupId")
        .to_string();
    let aki = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "group.join",
        json!({ "groupId": group_id, "displayName": "Aki" }),
    );
    let aki_token = aki
        .get("accessToken")
        .and_then(|v| v.as_str())
        .expect("accessToken")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.open",
        json!({ "groupId": group_id, "accessToken": aki_token }),
    );

    // Edit two different months before saving.
    let this_month = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.open",
        json!({ "monthOffset": 0 }),
    );
    let (y0, m0) = month_key(&this_month);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "calendar.setDay",
        json!({ "dayIndex": 0, "value": "〇" }),
    );

    let next_month = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "calendar.open",
        json!({ "monthOffset": 1 }),
    );
    let (y1, m1) = month_key(&next_month);
    assert_ne!((y0, m0), (y1, m1));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "calendar.setDay",
        json!({ "dayIndex": 1, "value": "×" }),
    );

    let saved = request_ok(&mut stdin, &mut reader, "9", "schedule.save", json!({}));
    assert_eq!(saved.get("saved").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(saved.get("monthCount").and_then(|v| v.as_u64()), Some(2));

    // A fresh session sees exactly the committed collection.
    let reloaded = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "session.open",
        json!({ "groupId": group_id, "accessToken": aki_token }),
    );
    assert_eq!(reloaded.get("monthCount").and_then(|v| v.as_u64()), Some(2));
    let this_codes = schedule_codes(&reloaded, y0, m0);
    assert_eq!(this_codes[0], "〇");
    assert!(this_codes[1..].iter().all(|c| c == "-"));
    let next_codes = schedule_codes(&reloaded, y1, m1);
    assert_eq!(next_codes[1], "×");
    assert_eq!(next_codes[0], "-");

    // Another member's store rows are isolated from Aki's commits.
    let riko = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "group.join",
        json!({ "groupId": group_id, "displayName": "Riko" }),
    );
    let riko_token = riko
        .get("accessToken")
        .and_then(|v| v.as_str())
        .expect("accessToken")
        .to_string();
    let riko_session = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "session.open",
        json!({ "groupId": group_id, "accessToken": riko_token }),
    );
    assert_eq!(
        riko_session.get("monthCount").and_then(|v| v.as_u64()),
        Some(0)
    );
    let riko_view = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "calendar.open",
        json!({ "monthOffset": 0 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "calendar.setDay",
        json!({ "dayIndex": 2, "value": "△" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "15", "schedule.save", json!({}));
    let (ry, rm) = month_key(&riko_view);
    assert_eq!((ry, rm), (y0, m0));

    let aki_again = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "session.open",
        json!({ "groupId": group_id, "accessToken": aki_token }),
    );
    assert_eq!(
        aki_again.get("monthCount").and_then(|v| v.as_u64()),
        Some(2)
    );
    let codes = schedule_codes(&aki_again, y0, m0);
    assert_eq!(codes[0], "〇");
    assert_eq!(codes[2], "-");

    // Unknown tokens never get a session.
    let denied = request(
        &mut stdin,
        &mut reader,
        "17",
        "session.open",
        json!({ "groupId": group_id, "accessToken": "not-a-token" }),
    );
    assert_eq!(
        denied
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str()),
        Some("auth_failed")
    );
}
