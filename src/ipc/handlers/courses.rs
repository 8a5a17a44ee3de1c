use crate::courses;
use crate::ipc::helpers::{dispatch, required_i64, required_str, HandlerErr, HandlerFn};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn handle_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let program = required_str(params, "program")?;
    let term = required_i64(params, "term")?;
    let course_id = courses::add_course(conn, name, program, term)?;
    Ok(json!({ "courseId": course_id }))
}

fn handle_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "courses": courses::list_courses(conn)? }))
}

fn handle_for_program(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let program = required_str(params, "program")?;
    let term = required_i64(params, "term")?;
    Ok(json!({ "courses": courses::courses_for(conn, program, term)? }))
}

fn handle_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_i64(params, "courseId")?;
    courses::delete_course(conn, course_id)?;
    Ok(json!({ "courseId": course_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: HandlerFn = match req.method.as_str() {
        "courses.add" => handle_add,
        "courses.list" => handle_list,
        "courses.forProgram" => handle_for_program,
        "courses.delete" => handle_delete,
        _ => return None,
    };
    Some(dispatch(state, req, handler))
}
