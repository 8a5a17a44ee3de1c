//! Student-facing read models: grade listings and the academic history
//! with per-term averages.

use crate::error::StorageError;
use crate::store::{Record, RowStore};
use crate::students;
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// 1-decimal rounding of the exact binary value, ties to even
/// (2.25 -> 2.2, 82.75 -> 82.8, 0.15 -> 0.1).
pub fn round_1_decimal(x: f64) -> f64 {
    format!("{x:.1}").parse().unwrap_or(x)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeView {
    pub grade_id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub program: String,
    pub term: i64,
    pub score: Option<f64>,
}

impl GradeView {
    fn from_record(row: &Record) -> Result<Self, StorageError> {
        Ok(Self {
            grade_id: row.i64("grade_id")?,
            course_id: row.i64("course_id")?,
            course_name: row.text("course_name")?,
            program: row.text("program")?,
            term: row.i64("term")?,
            score: row.opt_f64("score")?,
        })
    }
}

/// Grades of one student joined with their courses, optionally limited to
/// one term. Grades whose course row no longer exists are not listed.
pub fn grades_for_student<S: RowStore>(
    store: &S,
    student_id: i64,
    term: Option<i64>,
) -> Result<Vec<GradeView>, StorageError> {
    let mut sql = String::from(
        "SELECT g.id AS grade_id, g.course_id, c.name AS course_name, c.program, c.term, g.score
         FROM grades g
         JOIN courses c ON c.id = g.course_id
         WHERE g.student_id = ?",
    );
    let mut params = vec![Value::Integer(student_id)];
    if let Some(t) = term {
        sql.push_str(" AND c.term = ?");
        params.push(Value::Integer(t));
    }
    sql.push_str(" ORDER BY c.program, c.term, c.name, g.id");

    store
        .fetch_all(&sql, &params)?
        .iter()
        .map(GradeView::from_record)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub course_name: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermHistory {
    pub term: i64,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramHistory {
    pub program: String,
    pub terms: Vec<TermHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermAverage {
    pub term: i64,
    pub average: f64,
    pub course_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicHistory {
    pub student_id: i64,
    pub student_name: Option<String>,
    pub programs: Vec<ProgramHistory>,
    pub term_averages: Vec<TermAverage>,
}

impl AcademicHistory {
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Grades grouped by program then term, with an average per term taken
/// across programs. Ungraded (NULL) scores count as 0 in the average.
pub fn academic_history<S: RowStore>(
    store: &S,
    student_id: i64,
) -> Result<AcademicHistory, StorageError> {
    let student_name = students::get_student(store, student_id)?.map(|s| s.name);
    let grades = grades_for_student(store, student_id, None)?;

    let mut programs: Vec<ProgramHistory> = Vec::new();
    let mut per_term: BTreeMap<i64, Vec<f64>> = BTreeMap::new();

    for g in grades {
        per_term.entry(g.term).or_default().push(g.score.unwrap_or(0.0));

        if programs.last().map(|p| p.program != g.program).unwrap_or(true) {
            programs.push(ProgramHistory {
                program: g.program.clone(),
                terms: Vec::new(),
            });
        }
        let Some(program) = programs.last_mut() else {
            continue;
        };
        if program.terms.last().map(|t| t.term != g.term).unwrap_or(true) {
            program.terms.push(TermHistory {
                term: g.term,
                entries: Vec::new(),
            });
        }
        if let Some(term) = program.terms.last_mut() {
            term.entries.push(HistoryEntry {
                course_name: g.course_name,
                score: g.score,
            });
        }
    }

    let term_averages = per_term
        .into_iter()
        .map(|(term, scores)| {
            let sum: f64 = scores.iter().sum();
            TermAverage {
                term,
                average: round_1_decimal(sum / scores.len() as f64),
                course_count: scores.len(),
            }
        })
        .collect();

    Ok(AcademicHistory {
        student_id,
        student_name,
        programs,
        term_averages,
    })
}
