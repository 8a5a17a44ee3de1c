use rusqlite::Connection;
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
    let exe = env!("CARGO_BIN_EXE_recordsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn recordsd");
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

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn grades_record_inserts_then_updates_single_row() {
    let workspace = temp_dir("recordsd-grades-record");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.record",
        json!({ "studentId": 3, "courseId": 4, "score": 88 }),
    );
    assert_eq!(first.get("outcome").and_then(|v| v.as_str()), Some("inserted"));
    assert_eq!(
        first.get("message").and_then(|v| v.as_str()),
        Some("Grade recorded.")
    );

    let conn = Connection::open(workspace.join("records.sqlite3")).expect("open workspace db");
    let first_id: i64 = conn
        .query_row(
            "SELECT id FROM grades WHERE student_id = 3 AND course_id = 4",
            [],
            |r| r.get(0),
        )
        .expect("inserted row");

    // Form posts send numbers as strings.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.record",
        json!({ "studentId": "3", "courseId": "4", "score": "91" }),
    );
    assert_eq!(second.get("outcome").and_then(|v| v.as_str()), Some("updated"));

    let rows: Vec<(i64, f64)> = {
        let mut stmt = conn
            .prepare("SELECT id, score FROM grades WHERE student_id = 3 AND course_id = 4")
            .expect("prepare");
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows")
    };
    assert_eq!(rows, vec![(first_id, 91.0)]);
}

#[test]
fn grades_record_validates_params_and_workspace() {
    let workspace = temp_dir("recordsd-grades-validate");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let before = request(
        &mut stdin,
        &mut reader,
        "1",
        "grades.record",
        json!({ "studentId": 1, "courseId": 1, "score": 50 }),
    );
    assert_eq!(error_code(&before), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.record",
        json!({ "studentId": 1, "courseId": 1 }),
    );
    assert_eq!(error_code(&missing), Some("bad_params"));

    let garbled = request(
        &mut stdin,
        &mut reader,
        "4",
        "grades.record",
        json!({ "studentId": 1, "courseId": 1, "score": "ninety" }),
    );
    assert_eq!(error_code(&garbled), Some("bad_params"));

    let edit_missing = request(
        &mut stdin,
        &mut reader,
        "5",
        "grades.edit",
        json!({ "gradeId": 404, "score": 10 }),
    );
    assert_eq!(error_code(&edit_missing), Some("not_found"));
}

#[test]
fn grades_add_and_edit_work_by_grade_id() {
    let workspace = temp_dir("recordsd-grades-add-edit");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.add",
        json!({ "studentId": 2, "courseId": 8, "score": 60.5 }),
    );
    let grade_id = added.get("gradeId").and_then(|v| v.as_i64()).expect("gradeId");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.edit",
        json!({ "gradeId": grade_id, "score": 75 }),
    );

    let conn = Connection::open(workspace.join("records.sqlite3")).expect("open workspace db");
    let score: f64 = conn
        .query_row("SELECT score FROM grades WHERE id = ?", [grade_id], |r| r.get(0))
        .expect("edited row");
    assert_eq!(score, 75.0);
}
