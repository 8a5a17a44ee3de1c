use crate::grades;
use crate::history;
use crate::ipc::helpers::{
    dispatch, optional_i64, required_f64, required_i64, required_str, HandlerErr, HandlerFn,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn handle_record(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let course_id = required_i64(params, "courseId")?;
    let score = required_f64(params, "score")?;

    let outcome = grades::record_grade(conn, student_id, course_id, score)?;
    Ok(json!({
        "outcome": outcome,
        "message": outcome.message(),
    }))
}

fn handle_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let course_id = required_i64(params, "courseId")?;
    let score = required_f64(params, "score")?;

    let grade_id = grades::add_grade(conn, student_id, course_id, score)?;
    Ok(json!({ "gradeId": grade_id }))
}

fn handle_edit(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = required_i64(params, "gradeId")?;
    let score = required_f64(params, "score")?;
    grades::set_grade_score(conn, grade_id, score)?;
    Ok(json!({ "gradeId": grade_id }))
}

fn handle_initialize(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let program = required_str(params, "program")?;
    let term = required_i64(params, "term")?;
    let inserted = grades::initialize_for_student(conn, student_id, program, term)?;
    Ok(json!({ "inserted": inserted }))
}

fn handle_for_student(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let term = optional_i64(params, "term")?;
    let rows = history::grades_for_student(conn, student_id, term)?;
    Ok(json!({ "grades": rows }))
}

fn handle_history(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let history = history::academic_history(conn, student_id)?;
    if history.is_empty() && history.student_name.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: Some(json!({ "studentId": student_id })),
        });
    }
    Ok(json!(history))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: HandlerFn = match req.method.as_str() {
        "grades.record" => handle_record,
        "grades.add" => handle_add,
        "grades.edit" => handle_edit,
        "grades.initializeForStudent" => handle_initialize,
        "grades.forStudent" => handle_for_student,
        "grades.history" => handle_history,
        _ => return None,
    };
    Some(dispatch(state, req, handler))
}
