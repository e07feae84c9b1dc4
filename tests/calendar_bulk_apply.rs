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

fn selections(result: &serde_json::Value) -> Vec<String> {
    result
        .get("selections")
        .and_then(|v| v.as_array())
        .expect("selections array")
        .iter()
        .map(|v| v.as_str().expect("selection code").to_string())
        .collect()
}

#[test]
fn bulk_apply_sets_matching_weekdays_and_is_idempotent() {
    let workspace = temp_dir("availd-bulk-apply");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let group = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "group.create",
        json!({ "name": "Band Practice" }),
    );
    let group_id = group.get("groupId").and_then(|v| v.as_str()).expect("groupId");
    let member = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "group.join",
        json!({ "groupId": group_id, "displayName": "Riko" }),
    );
    let token = member
        .get("accessToken")
        .and_then(|v| v.as_str())
        .expect("accessToken");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.open",
        json!({ "groupId": group_id, "accessToken": token }),
    );

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calendar.open",
        json!({ "monthOffset": 2 }),
    );
    let days = view.get("daysInMonth").and_then(|v| v.as_u64()).expect("daysInMonth") as usize;
    let start_weekday = view
        .get("startWeekday")
        .and_then(|v| v.as_u64())
        .expect("startWeekday") as usize;

    // "-" means every day.
    let all = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "calendar.bulkApply",
        json!({ "day": "-", "value": "△" }),
    );
    let all_sel = selections(&all);
    assert_eq!(all_sel.len(), days);
    assert!(all_sel.iter().all(|s| s == "△"));

    // A named weekday only touches matching days; the rest keep their
    // previous state.
    let sat = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "calendar.bulkApply",
        json!({ "day": "Saturday", "value": "〇" }),
    );
    let sat_sel = selections(&sat);
    let mut saturdays = 0;
    for (i, code) in sat_sel.iter().enumerate() {
        if (start_weekday + i) % 7 == 6 {
            assert_eq!(code, "〇", "index {}", i);
            saturdays += 1;
        } else {
            assert_eq!(code, "△", "index {}", i);
        }
    }
    assert!((4..=5).contains(&saturdays));

    // Direct set, not a toggle: same request again changes nothing.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "calendar.bulkApply",
        json!({ "day": "Saturday", "value": "〇" }),
    );
    assert_eq!(selections(&again), sat_sel);

    // Single-cell edits still toggle on top of a bulk result.
    let first_saturday = (0..days)
        .find(|i| (start_weekday + i) % 7 == 6)
        .expect("month has a saturday");
    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "calendar.setDay",
        json!({ "dayIndex": first_saturday, "value": "〇" }),
    );
    assert_eq!(selections(&toggled)[first_saturday], "-");

    let bad = request(
        &mut stdin,
        &mut reader,
        "10",
        "calendar.bulkApply",
        json!({ "day": "Caturday", "value": "〇" }),
    );
    assert_eq!(
        bad.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str()),
        Some("bad_params")
    );
}
