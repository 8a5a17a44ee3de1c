//! Grade writes: the (student, course) upsert and the supporting edit paths.

use crate::error::StorageError;
use crate::store::{text, RowStore};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    pub fn message(self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "Grade recorded.",
            UpsertOutcome::Updated => "Grade updated.",
        }
    }
}

fn check_score(score: f64) -> Result<(), StorageError> {
    if !score.is_finite() {
        return Err(StorageError::InvalidInput(format!(
            "score must be a finite number, got {score}"
        )));
    }
    Ok(())
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Record `score` for the (student, course) pair, updating the existing
/// grade row if there is one and inserting otherwise.
///
/// The lookup and the write share one IMMEDIATE transaction, so two callers
/// on the same database cannot both miss the row and both insert. Rows
/// written by `add_grade` or older data can still leave duplicates; when they
/// exist the lowest id is the one updated.
pub fn record_grade(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    score: f64,
) -> Result<UpsertOutcome, StorageError> {
    check_score(score)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let outcome = upsert_grade(&tx, student_id, course_id, score)?;
    tx.commit()?;

    tracing::debug!(student_id, course_id, score, ?outcome, "grade recorded");
    Ok(outcome)
}

fn upsert_grade<S: RowStore>(
    store: &S,
    student_id: i64,
    course_id: i64,
    score: f64,
) -> Result<UpsertOutcome, StorageError> {
    let existing = store.fetch_one(
        "SELECT id FROM grades WHERE student_id = ? AND course_id = ? ORDER BY id LIMIT 1",
        &[Value::Integer(student_id), Value::Integer(course_id)],
    )?;

    match existing {
        Some(row) => {
            let grade_id = row.i64("id")?;
            store.execute_sql(
                "UPDATE grades SET score = ?, updated_at = ? WHERE id = ?",
                &[Value::Real(score), text(&now_stamp()), Value::Integer(grade_id)],
            )?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            store.execute_sql(
                "INSERT INTO grades(student_id, course_id, score, updated_at) VALUES(?, ?, ?, ?)",
                &[
                    Value::Integer(student_id),
                    Value::Integer(course_id),
                    Value::Real(score),
                    text(&now_stamp()),
                ],
            )?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}

/// Unconditional insert. Repeated calls for the same pair create duplicate
/// rows that only the duplicate resolver removes.
pub fn add_grade<S: RowStore>(
    store: &S,
    student_id: i64,
    course_id: i64,
    score: f64,
) -> Result<i64, StorageError> {
    check_score(score)?;
    store.execute_sql(
        "INSERT INTO grades(student_id, course_id, score, updated_at) VALUES(?, ?, ?, ?)",
        &[
            Value::Integer(student_id),
            Value::Integer(course_id),
            Value::Real(score),
            text(&now_stamp()),
        ],
    )?;
    let grade_id = store.last_insert_id();
    tracing::debug!(grade_id, student_id, course_id, "grade appended");
    Ok(grade_id)
}

/// Edit a single grade row by id.
pub fn set_grade_score<S: RowStore>(
    store: &S,
    grade_id: i64,
    score: f64,
) -> Result<(), StorageError> {
    check_score(score)?;
    let changed = store.execute_sql(
        "UPDATE grades SET score = ?, updated_at = ? WHERE id = ?",
        &[Value::Real(score), text(&now_stamp()), Value::Integer(grade_id)],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("grade {grade_id}")));
    }
    Ok(())
}

/// Seed a zero grade for every course of the program/term the student has
/// no grade for yet. Returns the number of rows inserted.
pub fn initialize_for_student(
    conn: &Connection,
    student_id: i64,
    program: &str,
    term: i64,
) -> Result<usize, StorageError> {
    let tx = conn.unchecked_transaction()?;
    let inserted = tx.execute_sql(
        "INSERT INTO grades(student_id, course_id, score, updated_at)
         SELECT ?, c.id, 0, ?
         FROM courses c
         WHERE c.program = ? AND c.term = ?
           AND NOT EXISTS (
             SELECT 1 FROM grades g WHERE g.student_id = ? AND g.course_id = c.id
           )
         ORDER BY c.id",
        &[
            Value::Integer(student_id),
            text(&now_stamp()),
            text(program),
            Value::Integer(term),
            Value::Integer(student_id),
        ],
    )?;
    tx.commit()?;
    tracing::debug!(student_id, program, term, inserted, "grades initialized");
    Ok(inserted)
}
