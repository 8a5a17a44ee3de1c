use crate::error::StorageError;
use crate::store::{text, Record, RowStore};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub program: String,
    pub term: i64,
}

impl Course {
    fn from_record(row: &Record) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.i64("id")?,
            name: row.text("name")?,
            program: row.text("program")?,
            term: row.i64("term")?,
        })
    }
}

pub fn course_exists<S: RowStore>(
    store: &S,
    name: &str,
    program: &str,
    term: i64,
) -> Result<bool, StorageError> {
    Ok(store
        .fetch_one(
            "SELECT 1 AS hit FROM courses WHERE name = ? AND program = ? AND term = ? LIMIT 1",
            &[text(name), text(program), Value::Integer(term)],
        )?
        .is_some())
}

/// Register a course and link it to its program/term. An existing course
/// with the same name, program and term is a conflict.
///
/// The existence check and the insert are separate statements, so two
/// concurrent adds may still both succeed; the duplicate resolver cleans
/// that up.
pub fn add_course(
    conn: &Connection,
    name: &str,
    program: &str,
    term: i64,
) -> Result<i64, StorageError> {
    let name = name.trim();
    let program = program.trim();
    if name.is_empty() || program.is_empty() {
        return Err(StorageError::InvalidInput(
            "name and program are required".to_string(),
        ));
    }
    if term < 1 {
        return Err(StorageError::InvalidInput(format!(
            "term must be >= 1, got {term}"
        )));
    }

    if course_exists(conn, name, program, term)? {
        tracing::warn!(name, program, term, "course already registered");
        return Err(StorageError::Conflict(format!(
            "course {name} already exists for {program} term {term}"
        )));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_sql(
        "INSERT INTO courses(name, program, term) VALUES(?, ?, ?)",
        &[text(name), text(program), Value::Integer(term)],
    )?;
    let course_id = tx.last_insert_id();
    tx.execute_sql(
        "INSERT INTO program_courses(course_id, program, term) VALUES(?, ?, ?)",
        &[Value::Integer(course_id), text(program), Value::Integer(term)],
    )?;
    tx.commit()?;

    tracing::debug!(course_id, name, program, term, "course added");
    Ok(course_id)
}

pub fn list_courses<S: RowStore>(store: &S) -> Result<Vec<Course>, StorageError> {
    store
        .fetch_all(
            "SELECT id, name, program, term FROM courses ORDER BY program, term, name, id",
            &[],
        )?
        .iter()
        .map(Course::from_record)
        .collect()
}

/// Courses linked to a program and term.
pub fn courses_for<S: RowStore>(
    store: &S,
    program: &str,
    term: i64,
) -> Result<Vec<Course>, StorageError> {
    store
        .fetch_all(
            "SELECT DISTINCT c.id, c.name, c.program, c.term
             FROM courses c
             JOIN program_courses pc ON pc.course_id = c.id
             WHERE pc.program = ? AND pc.term = ?
             ORDER BY c.name, c.id",
            &[text(program), Value::Integer(term)],
        )?
        .iter()
        .map(Course::from_record)
        .collect()
}

/// Remove a course from the catalog together with its program links and
/// grades.
pub fn delete_course(conn: &Connection, id: i64) -> Result<(), StorageError> {
    let tx = conn.unchecked_transaction()?;
    // Dependents before the course row.
    tx.execute_sql(
        "DELETE FROM program_courses WHERE course_id = ?",
        &[Value::Integer(id)],
    )?;
    let grades = tx.execute_sql("DELETE FROM grades WHERE course_id = ?", &[Value::Integer(id)])?;
    let removed = tx.execute_sql("DELETE FROM courses WHERE id = ?", &[Value::Integer(id)])?;
    if removed == 0 {
        // Dropping the transaction rolls back the dependent deletes.
        return Err(StorageError::NotFound(format!("course {id}")));
    }
    tx.commit()?;

    tracing::info!(course_id = id, grades, "course deleted");
    Ok(())
}
