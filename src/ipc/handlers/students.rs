use crate::ipc::helpers::{dispatch, required_i64, required_str, HandlerErr, HandlerFn};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, NewStudent};
use rusqlite::Connection;
use serde_json::json;

fn handle_save(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student = NewStudent {
        name: required_str(params, "name")?.to_string(),
        enrollment: required_str(params, "enrollment")?.to_string(),
        program: required_str(params, "program")?.to_string(),
        term: required_i64(params, "term")?,
    };
    let (student_id, outcome) = students::save_student(conn, &student)?;
    Ok(json!({ "studentId": student_id, "outcome": outcome }))
}

fn handle_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "students": students::list_students(conn)? }))
}

fn handle_find(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program = required_str(params, "program")?;
    let term = required_i64(params, "term")?;
    let name = required_str(params, "name")?;
    match students::find_student(conn, program, term, name)? {
        Some(student) => Ok(json!({ "student": student })),
        None => Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: Some(json!({ "program": program, "term": term, "name": name })),
        }),
    }
}

fn handle_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    students::delete_student(conn, student_id)?;
    Ok(json!({ "studentId": student_id }))
}

fn handle_promote(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program = required_str(params, "program")?;
    let from_term = required_i64(params, "fromTerm")?;
    let to_term = required_i64(params, "toTerm")?;
    let moved = students::promote_term(conn, program, from_term, to_term)?;
    Ok(json!({ "moved": moved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: HandlerFn = match req.method.as_str() {
        "students.save" => handle_save,
        "students.list" => handle_list,
        "students.find" => handle_find,
        "students.delete" => handle_delete,
        "students.promote" => handle_promote,
        _ => return None,
    };
    Some(dispatch(state, req, handler))
}
