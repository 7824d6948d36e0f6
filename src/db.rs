use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::accounts::{self, Role};

pub const DB_FILE: &str = "gradebook.sqlite3";

/// Subjects every fresh install starts with.
pub const DEFAULT_SUBJECTS: &[(&str, &str)] = &[
    ("Matemática", "Primero Primaria"),
    ("Lenguaje", "Primero Primaria"),
    ("Ciencias", "Primero Primaria"),
    ("Matemática", "Segundo Primaria"),
    ("Lenguaje", "Segundo Primaria"),
    ("Sociales", "Segundo Primaria"),
];

pub fn open_db(data_dir: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create directory {}", data_dir.to_string_lossy()))?;
    let db_path = data_dir.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'teacher'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            grade_level TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_grade_level ON students(grade_level)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            grade_level TEXT NOT NULL,
            UNIQUE(name, grade_level)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            teacher_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            grade_level TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES users(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(teacher_id, subject_id, grade_level)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_teacher ON assignments(teacher_id)",
        [],
    )?;

    // Grades carry the subject by name, not by id: a report groups by what
    // the teacher's assigned subject was called when the score went in.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            subject TEXT NOT NULL,
            block INTEGER NOT NULL CHECK(block BETWEEN 1 AND 4),
            score REAL NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(student_id, subject, block)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            action TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub admin_created: bool,
    pub subjects_seeded: usize,
}

/// Makes sure the configured admin account and the default subjects exist.
/// Existing rows are left alone, so this is safe on every start.
pub fn bootstrap(
    conn: &Connection,
    admin_email: &str,
    admin_password: &str,
) -> anyhow::Result<BootstrapSummary> {
    let mut summary = BootstrapSummary::default();

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?",
            [admin_email],
            |r| r.get(0),
        )
        .optional()?;
    if existing.is_none() {
        accounts::create_user(conn, "Administrador", admin_email, admin_password, Role::Admin)
            .context("failed to create bootstrap admin")?;
        summary.admin_created = true;
    }

    for (name, grade_level) in DEFAULT_SUBJECTS {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subjects(name, grade_level) VALUES(?, ?)",
            (name, grade_level),
        )?;
        summary.subjects_seeded += inserted;
    }

    Ok(summary)
}
