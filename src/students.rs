use crate::error::StorageError;
use crate::store::{text, Record, RowStore};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub enrollment: String,
    pub program: Option<String>,
    pub term: Option<i64>,
}

impl Student {
    fn from_record(row: &Record) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.i64("id")?,
            name: row.text("name")?,
            enrollment: row.text("enrollment")?,
            program: row.opt_text("program")?,
            term: row.opt_i64("term")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub enrollment: String,
    pub program: String,
    pub term: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Insert a student, or refresh name/program/term of the student that
/// already holds this enrollment number.
pub fn save_student(
    conn: &Connection,
    student: &NewStudent,
) -> Result<(i64, SaveOutcome), StorageError> {
    let name = student.name.trim();
    let enrollment = student.enrollment.trim();
    if name.is_empty() || enrollment.is_empty() {
        return Err(StorageError::InvalidInput(
            "name and enrollment are required".to_string(),
        ));
    }
    if student.term < 1 {
        return Err(StorageError::InvalidInput(format!(
            "term must be >= 1, got {}",
            student.term
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let existing = tx.fetch_one(
        "SELECT id FROM students WHERE enrollment = ?",
        &[text(enrollment)],
    )?;
    let saved = match existing {
        Some(row) => {
            let id = row.i64("id")?;
            tx.execute_sql(
                "UPDATE students SET name = ?, program = ?, term = ? WHERE id = ?",
                &[
                    text(name),
                    text(&student.program),
                    Value::Integer(student.term),
                    Value::Integer(id),
                ],
            )?;
            (id, SaveOutcome::Updated)
        }
        None => {
            tx.execute_sql(
                "INSERT INTO students(name, enrollment, program, term) VALUES(?, ?, ?, ?)",
                &[
                    text(name),
                    text(enrollment),
                    text(&student.program),
                    Value::Integer(student.term),
                ],
            )?;
            (tx.last_insert_id(), SaveOutcome::Created)
        }
    };
    tx.commit()?;

    tracing::debug!(student_id = saved.0, enrollment, outcome = ?saved.1, "student saved");
    Ok(saved)
}

pub fn list_students<S: RowStore>(store: &S) -> Result<Vec<Student>, StorageError> {
    store
        .fetch_all(
            "SELECT id, name, enrollment, program, term FROM students
             ORDER BY program, term, name, id",
            &[],
        )?
        .iter()
        .map(Student::from_record)
        .collect()
}

pub fn get_student<S: RowStore>(store: &S, id: i64) -> Result<Option<Student>, StorageError> {
    store
        .fetch_one(
            "SELECT id, name, enrollment, program, term FROM students WHERE id = ?",
            &[Value::Integer(id)],
        )?
        .as_ref()
        .map(Student::from_record)
        .transpose()
}

/// Locate a student by name within a program and term.
pub fn find_student<S: RowStore>(
    store: &S,
    program: &str,
    term: i64,
    name: &str,
) -> Result<Option<Student>, StorageError> {
    store
        .fetch_one(
            "SELECT id, name, enrollment, program, term FROM students
             WHERE name = ? AND program = ? AND term = ?
             ORDER BY id LIMIT 1",
            &[text(name.trim()), text(program), Value::Integer(term)],
        )?
        .as_ref()
        .map(Student::from_record)
        .transpose()
}

/// Remove a student and every grade recorded for them.
pub fn delete_student(conn: &Connection, id: i64) -> Result<(), StorageError> {
    let tx = conn.unchecked_transaction()?;
    let grades = tx.execute_sql(
        "DELETE FROM grades WHERE student_id = ?",
        &[Value::Integer(id)],
    )?;
    let removed = tx.execute_sql("DELETE FROM students WHERE id = ?", &[Value::Integer(id)])?;
    if removed == 0 {
        // Dropping the transaction rolls back the grade delete.
        return Err(StorageError::NotFound(format!("student {id}")));
    }
    tx.commit()?;
    tracing::info!(student_id = id, grades, "student deleted");
    Ok(())
}

/// Move every student of `program` in `from_term` to `to_term`.
pub fn promote_term(
    conn: &Connection,
    program: &str,
    from_term: i64,
    to_term: i64,
) -> Result<usize, StorageError> {
    if to_term < 1 {
        return Err(StorageError::InvalidInput(
            "destination term cannot be below 1".to_string(),
        ));
    }
    let moved = conn.execute_sql(
        "UPDATE students SET term = ? WHERE program = ? AND term = ?",
        &[Value::Integer(to_term), text(program), Value::Integer(from_term)],
    )?;
    tracing::info!(program, from_term, to_term, moved, "students promoted");
    Ok(moved)
}
