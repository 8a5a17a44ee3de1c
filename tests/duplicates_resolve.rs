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

fn ids(conn: &Connection, table: &str) -> Vec<i64> {
    let mut stmt = conn
        .prepare(&format!("SELECT id FROM {} ORDER BY id", table))
        .expect("prepare ids");
    stmt.query_map([], |r| r.get(0))
        .expect("query ids")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect ids")
}

/// Direct handle on the sidecar's database, with the same relaxed
/// reference checks the sidecar uses.
fn open_workspace_db(workspace: &std::path::Path) -> Connection {
    let conn = Connection::open(workspace.join("records.sqlite3")).expect("open workspace db");
    conn.pragma_update(None, "foreign_keys", false)
        .expect("foreign_keys off");
    conn
}

fn listed_ids(result: &serde_json::Value) -> Vec<i64> {
    result
        .get("rows")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|r| r.get("id").and_then(|v| v.as_i64()))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn duplicates_resolve_keeps_lowest_id_and_is_idempotent() {
    let workspace = temp_dir("recordsd-duplicates-resolve");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Seed rows the way concurrent writers would leave them.
    let conn = open_workspace_db(&workspace);
    conn.execute_batch(
        "INSERT INTO courses(id, name, program, term) VALUES (5, 'Calculus I', 'Civil', 1);
         INSERT INTO courses(id, name, program, term) VALUES (2, 'Calculus I', 'Civil', 1);
         INSERT INTO courses(id, name, program, term) VALUES (9, 'Calculus I', 'Civil', 1);
         INSERT INTO courses(id, name, program, term) VALUES (20, 'Physics I', 'Civil', 1);
         INSERT INTO grades(id, student_id, course_id, score) VALUES (11, 1, 7, 80);
         INSERT INTO grades(id, student_id, course_id, score) VALUES (12, 1, 7, 95);
         INSERT INTO grades(id, student_id, course_id, score) VALUES (13, 1, 7, 70);
         INSERT INTO grades(id, student_id, course_id, score) VALUES (14, 2, 7, 66);",
    )
    .expect("seed duplicates");

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "duplicates.list",
        json!({ "group": "courses" }),
    );
    assert_eq!(listed_ids(&preview), vec![2, 5, 9]);
    assert_eq!(preview.get("redundantCount").and_then(|v| v.as_i64()), Some(2));
    let first = &preview["rows"][0];
    assert_eq!(first.get("rank").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(
        first.get("key").and_then(|k| k.get("kind")).and_then(|v| v.as_str()),
        Some("course")
    );

    let courses = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "duplicates.resolve",
        json!({ "group": "courses" }),
    );
    assert_eq!(courses.get("removed").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(ids(&conn, "courses"), vec![2, 20]);

    let grades = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "duplicates.resolve",
        json!({ "group": "grades" }),
    );
    assert_eq!(grades.get("removed").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(ids(&conn, "grades"), vec![11, 14]);
    let kept: f64 = conn
        .query_row("SELECT score FROM grades WHERE id = 11", [], |r| r.get(0))
        .expect("canonical grade");
    assert_eq!(kept, 80.0);

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "duplicates.resolve",
        json!({ "group": "grades" }),
    );
    assert_eq!(again.get("removed").and_then(|v| v.as_i64()), Some(0));

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "duplicates.list",
        json!({ "group": "grades" }),
    );
    assert!(listed_ids(&empty).is_empty());
}

#[test]
fn duplicates_delete_selected_removes_operator_choice() {
    let workspace = temp_dir("recordsd-duplicates-selected");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, score) in [70, 72, 74].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("add-{}", i),
            "grades.add",
            json!({ "studentId": 4, "courseId": 2, "score": score }),
        );
    }

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "duplicates.list",
        json!({ "group": "grades" }),
    );
    let listed = listed_ids(&preview);
    assert_eq!(listed.len(), 3);
    let scores: Vec<f64> = preview["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r.get("score").and_then(|v| v.as_f64()))
        .collect();
    assert_eq!(scores, vec![70.0, 72.0, 74.0]);

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "duplicates.deleteSelected",
        json!({ "group": "grades", "ids": [listed[2]] }),
    );
    assert_eq!(deleted.get("removed").and_then(|v| v.as_i64()), Some(1));

    let after = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "duplicates.list",
        json!({ "group": "grades" }),
    );
    assert_eq!(listed_ids(&after), vec![listed[0], listed[1]]);

    let none_selected = request(
        &mut stdin,
        &mut reader,
        "5",
        "duplicates.deleteSelected",
        json!({ "group": "grades", "ids": [] }),
    );
    assert_eq!(error_code(&none_selected), Some("bad_params"));

    let bad_group = request(
        &mut stdin,
        &mut reader,
        "6",
        "duplicates.list",
        json!({ "group": "students" }),
    );
    assert_eq!(error_code(&bad_group), Some("bad_params"));
}

#[test]
fn duplicates_resolve_courses_on_enrolled_data_keeps_orphans() {
    let workspace = temp_dir("recordsd-duplicates-enrolled");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.save",
        json!({ "name": "Ana Ruiz", "enrollment": "A-001", "program": "Civil", "term": 1 }),
    );
    let student = saved.get("studentId").and_then(|v| v.as_i64()).expect("studentId");
    let added = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.add",
        json!({ "name": "Statics", "program": "Civil", "term": 1 }),
    );
    let course = added.get("courseId").and_then(|v| v.as_i64()).expect("courseId");

    // A second registration that raced past the existence check, with its
    // own program link.
    let conn = open_workspace_db(&workspace);
    conn.execute(
        "INSERT INTO courses(name, program, term) VALUES ('Statics', 'Civil', 1)",
        [],
    )
    .expect("racing course");
    let copy = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO program_courses(course_id, program, term) VALUES (?, 'Civil', 1)",
        [copy],
    )
    .expect("racing link");

    for (id, course_id, score) in [("4", course, 88), ("5", copy, 70)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "grades.record",
            json!({ "studentId": student, "courseId": course_id, "score": score }),
        );
    }

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "duplicates.list",
        json!({ "group": "grades" }),
    );
    assert!(listed_ids(&preview).is_empty());

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "duplicates.resolve",
        json!({ "group": "courses" }),
    );
    assert_eq!(resolved.get("removed").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(ids(&conn, "courses"), vec![course]);

    let orphaned: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM grades WHERE course_id = ?",
            [copy],
            |r| r.get(0),
        )
        .expect("orphan count");
    assert_eq!(orphaned, 1);

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grades.history",
        json!({ "studentId": student }),
    );
    let averages = history["termAverages"].as_array().expect("termAverages");
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0].get("average").and_then(|v| v.as_f64()), Some(88.0));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "grades.add",
        json!({ "studentId": student, "courseId": course, "score": 91 }),
    );
    let named = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "duplicates.list",
        json!({ "group": "grades" }),
    );
    let rows = named["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("studentName").and_then(|v| v.as_str()), Some("Ana Ruiz"));
    assert_eq!(rows[0].get("courseName").and_then(|v| v.as_str()), Some("Statics"));
}
