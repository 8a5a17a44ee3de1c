use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub const DB_FILE: &str = "records.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Create missing tables and columns. Foreign keys are declared but not
/// enforced: duplicate resolution may leave grades pointing at a deleted
/// course row, and grades may be written before their student exists.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // The bundled SQLite build enables enforcement by default.
    conn.pragma_update(None, "foreign_keys", false)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT,
            UNIQUE(role, username)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            enrollment TEXT NOT NULL UNIQUE,
            program TEXT,
            term INTEGER
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_program_term ON students(program, term)",
        [],
    )?;

    // No uniqueness on (name, program, term): duplicates are resolved after the fact.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            program TEXT NOT NULL,
            term INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_identity ON courses(name, program, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS program_courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER,
            program TEXT,
            term INTEGER,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_program_courses_program_term ON program_courses(program, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            score REAL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_grades_updated_at(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student_course ON grades(student_id, course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id)",
        [],
    )?;

    Ok(())
}

fn ensure_grades_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grades", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE grades ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
