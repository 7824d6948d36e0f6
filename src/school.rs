//! Admin-managed school structure: students, subjects and the assignments
//! that authorize a teacher to grade a subject within a grade-level.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::accounts::{self, Role};
use crate::error::{on_unique_violation, AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub grade_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub grade_level: String,
}

/// Assignment row joined with the names a listing page needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub grade_level: String,
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        grade_level: row.get(2)?,
    })
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        grade_level: row.get(2)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        teacher_id: row.get(1)?,
        teacher_name: row.get(2)?,
        subject_id: row.get(3)?,
        subject_name: row.get(4)?,
        grade_level: row.get(5)?,
    })
}

fn required(value: &str, what: &str) -> AppResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::bad_params(format!("{what} es obligatorio")));
    }
    Ok(v.to_string())
}

// ---------------------------------------------------------------- students

pub fn list_students(conn: &Connection) -> AppResult<Vec<Student>> {
    let mut stmt =
        conn.prepare("SELECT id, name, grade_level FROM students ORDER BY grade_level, name")?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn students_in_grade(conn: &Connection, grade_level: &str) -> AppResult<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, grade_level FROM students WHERE grade_level = ? ORDER BY name",
    )?;
    let rows = stmt
        .query_map([grade_level], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Distinct grade-levels that have at least one student, sorted.
pub fn grade_levels(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT grade_level FROM students ORDER BY grade_level")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_student(conn: &Connection, id: i64) -> AppResult<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, name, grade_level FROM students WHERE id = ?",
            [id],
            student_from_row,
        )
        .optional()?)
}

pub fn find_student_in_grade(
    conn: &Connection,
    name: &str,
    grade_level: &str,
) -> AppResult<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, name, grade_level FROM students WHERE name = ? AND grade_level = ?",
            (name, grade_level),
            student_from_row,
        )
        .optional()?)
}

/// Student names are unique across the whole school, not per grade-level.
pub fn create_student(conn: &Connection, name: &str, grade_level: &str) -> AppResult<Student> {
    let name = required(name, "El nombre")?;
    let grade_level = required(grade_level, "El grado")?;

    let exists: Option<i64> = conn
        .query_row("SELECT id FROM students WHERE name = ?", [&name], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_some() {
        return Err(AppError::duplicate("El alumno ya existe"));
    }

    conn.execute(
        "INSERT INTO students(name, grade_level) VALUES(?, ?)",
        (&name, &grade_level),
    )
    .map_err(|e| on_unique_violation(e, "El alumno ya existe"))?;

    Ok(Student {
        id: conn.last_insert_rowid(),
        name,
        grade_level,
    })
}

// ---------------------------------------------------------------- subjects

pub fn list_subjects(conn: &Connection) -> AppResult<Vec<Subject>> {
    let mut stmt =
        conn.prepare("SELECT id, name, grade_level FROM subjects ORDER BY grade_level, name")?;
    let rows = stmt
        .query_map([], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_subject(conn: &Connection, id: i64) -> AppResult<Option<Subject>> {
    Ok(conn
        .query_row(
            "SELECT id, name, grade_level FROM subjects WHERE id = ?",
            [id],
            subject_from_row,
        )
        .optional()?)
}

pub fn create_subject(conn: &Connection, name: &str, grade_level: &str) -> AppResult<Subject> {
    let name = required(name, "El nombre")?;
    let grade_level = required(grade_level, "El grado")?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM subjects WHERE name = ? AND grade_level = ?",
            (&name, &grade_level),
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(AppError::duplicate("La materia ya existe para ese grado"));
    }

    conn.execute(
        "INSERT INTO subjects(name, grade_level) VALUES(?, ?)",
        (&name, &grade_level),
    )
    .map_err(|e| on_unique_violation(e, "La materia ya existe para ese grado"))?;

    Ok(Subject {
        id: conn.last_insert_rowid(),
        name,
        grade_level,
    })
}

// ------------------------------------------------------------- assignments

const ASSIGNMENT_SELECT: &str = "SELECT a.id, a.teacher_id, u.name, a.subject_id, s.name, a.grade_level
     FROM assignments a
     JOIN users u ON u.id = a.teacher_id
     JOIN subjects s ON s.id = a.subject_id";

pub fn list_assignments(conn: &Connection) -> AppResult<Vec<Assignment>> {
    let sql = format!("{ASSIGNMENT_SELECT} ORDER BY a.grade_level, s.name, u.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn assignments_for_teacher(conn: &Connection, teacher_id: i64) -> AppResult<Vec<Assignment>> {
    let sql = format!("{ASSIGNMENT_SELECT} WHERE a.teacher_id = ? ORDER BY a.grade_level, s.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([teacher_id], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The authorization lookup behind grade entry.
pub fn find_assignment(
    conn: &Connection,
    teacher_id: i64,
    subject_id: i64,
    grade_level: &str,
) -> AppResult<Option<Assignment>> {
    let sql = format!(
        "{ASSIGNMENT_SELECT} WHERE a.teacher_id = ? AND a.subject_id = ? AND a.grade_level = ?"
    );
    Ok(conn
        .query_row(&sql, (teacher_id, subject_id, grade_level), assignment_from_row)
        .optional()?)
}

pub fn create_assignment(
    conn: &Connection,
    teacher_id: i64,
    subject_id: i64,
    grade_level: &str,
) -> AppResult<Assignment> {
    let grade_level = required(grade_level, "El grado")?;

    let teacher = accounts::find_by_id(conn, teacher_id)?
        .filter(|u| u.role == Role::Teacher)
        .ok_or_else(|| AppError::not_found("Docente no encontrado"))?;
    let subject =
        find_subject(conn, subject_id)?.ok_or_else(|| AppError::not_found("Materia no encontrada"))?;

    if find_assignment(conn, teacher_id, subject_id, &grade_level)?.is_some() {
        return Err(AppError::duplicate("Asignación duplicada"));
    }

    conn.execute(
        "INSERT INTO assignments(teacher_id, subject_id, grade_level) VALUES(?, ?, ?)",
        (teacher_id, subject_id, &grade_level),
    )
    .map_err(|e| on_unique_violation(e, "Asignación duplicada"))?;

    Ok(Assignment {
        id: conn.last_insert_rowid(),
        teacher_id,
        teacher_name: teacher.name,
        subject_id,
        subject_name: subject.name,
        grade_level,
    })
}
