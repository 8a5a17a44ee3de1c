//! Duplicate detection and removal for tables whose identity is a column
//! tuple rather than a unique index.
//!
//! Within an identity group the row with the lowest surrogate id is
//! canonical; every other member is redundant. Ranking is done in SQL with
//! `ROW_NUMBER() OVER (PARTITION BY <key> ORDER BY id)`, which sorts the
//! scanned rows by key then id (O(n log n)).

use crate::error::StorageError;
use crate::store::{Record, RowStore};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityGroup {
    /// Courses keyed by (name, program, term).
    Courses,
    /// Grades keyed by (student_id, course_id).
    Grades,
}

impl IdentityGroup {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "courses" | "course" => Some(IdentityGroup::Courses),
            "grades" | "grade" => Some(IdentityGroup::Grades),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IdentityGroup::Courses => "courses",
            IdentityGroup::Grades => "grades",
        }
    }

    fn table(self) -> &'static str {
        self.as_str()
    }

    fn key_columns(self) -> &'static str {
        match self {
            IdentityGroup::Courses => "name, program, term",
            IdentityGroup::Grades => "student_id, course_id",
        }
    }

    fn select_columns(self) -> &'static str {
        match self {
            IdentityGroup::Courses => "id, name, program, term",
            IdentityGroup::Grades => "id, student_id, course_id, score",
        }
    }

    /// Outer projection and joins over the ranked rows `r`. Grade rows pick
    /// up display names; a missing student or course leaves them NULL.
    fn labelled_columns(self) -> (&'static str, &'static str) {
        match self {
            IdentityGroup::Courses => (
                "r.id AS id, r.name AS name, r.program AS program, r.term AS term, r.rn AS rn",
                "",
            ),
            IdentityGroup::Grades => (
                "r.id AS id, r.student_id AS student_id, r.course_id AS course_id,
                 r.score AS score, r.rn AS rn,
                 s.name AS student_name, c.name AS course_name",
                "LEFT JOIN students s ON s.id = r.student_id
                 LEFT JOIN courses c ON c.id = r.course_id",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum GroupKey {
    Course {
        name: String,
        program: String,
        term: i64,
    },
    Grade {
        student_id: i64,
        course_id: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRow {
    pub id: i64,
    /// 1 for the canonical (lowest id) member of the group.
    pub rank: i64,
    pub key: GroupKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
}

impl DuplicateRow {
    pub fn is_canonical(&self) -> bool {
        self.rank == 1
    }

    fn from_record(group: IdentityGroup, row: &Record) -> Result<Self, StorageError> {
        let id = row.i64("id")?;
        let rank = row.i64("rn")?;
        Ok(match group {
            IdentityGroup::Courses => Self {
                id,
                rank,
                key: GroupKey::Course {
                    name: row.text("name")?,
                    program: row.text("program")?,
                    term: row.i64("term")?,
                },
                score: None,
                student_name: None,
                course_name: None,
            },
            IdentityGroup::Grades => Self {
                id,
                rank,
                key: GroupKey::Grade {
                    student_id: row.i64("student_id")?,
                    course_id: row.i64("course_id")?,
                },
                score: row.opt_f64("score")?,
                student_name: row.opt_text("student_name")?,
                course_name: row.opt_text("course_name")?,
            },
        })
    }
}

/// Every member of every identity group that has more than one member,
/// ordered by group key then id. Singleton groups never appear. Grade rows
/// carry the student and course names when those rows still exist.
pub fn list_duplicate_groups<S: RowStore>(
    store: &S,
    group: IdentityGroup,
) -> Result<Vec<DuplicateRow>, StorageError> {
    let key = group.key_columns();
    let (outer, joins) = group.labelled_columns();
    let order = key
        .split(", ")
        .map(|c| format!("r.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "WITH ranked AS (
           SELECT {cols},
                  ROW_NUMBER() OVER (PARTITION BY {key} ORDER BY id) AS rn,
                  COUNT(*) OVER (PARTITION BY {key}) AS group_size
           FROM {table}
         )
         SELECT {outer} FROM ranked r
         {joins}
         WHERE r.group_size > 1
         ORDER BY {order}, r.id",
        cols = group.select_columns(),
        table = group.table(),
    );
    store
        .fetch_all(&sql, &[])?
        .iter()
        .map(|row| DuplicateRow::from_record(group, row))
        .collect()
}

/// Delete every non-canonical member of every identity group and return
/// how many rows were removed. Surviving rows are left untouched and rows
/// in other tables that reference a deleted row are not cleaned up.
pub fn resolve_duplicates(conn: &Connection, group: IdentityGroup) -> Result<usize, StorageError> {
    let sql = format!(
        "DELETE FROM {table} WHERE id IN (
           SELECT id FROM (
             SELECT id, ROW_NUMBER() OVER (PARTITION BY {key} ORDER BY id) AS rn
             FROM {table}
           )
           WHERE rn > 1
         )",
        table = group.table(),
        key = group.key_columns(),
    );

    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute_sql(&sql, &[])?;
    tx.commit()?;

    if removed > 0 {
        tracing::info!(group = group.as_str(), removed, "duplicate rows resolved");
    }
    Ok(removed)
}

/// Delete an operator-chosen subset of rows by id. Unknown ids are skipped;
/// the return value counts rows actually removed.
pub fn delete_selected(
    conn: &Connection,
    group: IdentityGroup,
    ids: &[i64],
) -> Result<usize, StorageError> {
    if ids.is_empty() {
        return Err(StorageError::InvalidInput(
            "no rows selected for deletion".to_string(),
        ));
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", group.table());
    let tx = conn.unchecked_transaction()?;
    let mut removed = 0;
    for id in ids {
        removed += tx.execute_sql(&sql, &[Value::Integer(*id)])?;
    }
    tx.commit()?;

    tracing::info!(
        group = group.as_str(),
        selected = ids.len(),
        removed,
        "selected duplicate rows deleted"
    );
    Ok(removed)
}
