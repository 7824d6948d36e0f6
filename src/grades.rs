use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{on_unique_violation, AppError, AppResult};
use crate::school::{self, Student};

pub const BLOCKS: std::ops::RangeInclusive<u8> = 1..=4;

/// Form field prefix for per-record replacement scores on the edit page.
pub const SCORE_FIELD_PREFIX: &str = "puntaje_";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRecord {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub block: u8,
    pub score: f64,
}

fn grade_from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        subject: row.get(2)?,
        block: row.get(3)?,
        score: row.get(4)?,
    })
}

/// A teacher's score submission as typed on the form.
#[derive(Debug, Clone)]
pub struct GradeEntry {
    pub student_name: String,
    pub grade_level: String,
    pub subject_id: i64,
    pub block: u8,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct RecordedGrade {
    pub student: Student,
    pub grade: GradeRecord,
}

/// Rows come back in insertion order; report grouping relies on that.
pub fn grades_for_student(conn: &Connection, student_id: i64) -> AppResult<Vec<GradeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, subject, block, score FROM grades WHERE student_id = ? ORDER BY id",
    )?;
    let rows = stmt
        .query_map([student_id], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn find_slot(
    conn: &Connection,
    student_id: i64,
    subject: &str,
    block: u8,
) -> AppResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM grades WHERE student_id = ? AND subject = ? AND block = ?",
            (student_id, subject, block),
            |r| r.get(0),
        )
        .optional()?)
}

/// Records one score for `teacher_id`.
///
/// Each check is a precondition for the next: the student must exist in the
/// grade-level, the teacher must hold an assignment for the subject in that
/// grade-level, and only then is the (student, subject, block) slot checked
/// for an existing score.
pub fn submit_grade(
    conn: &Connection,
    teacher_id: i64,
    entry: &GradeEntry,
) -> AppResult<RecordedGrade> {
    if !BLOCKS.contains(&entry.block) {
        return Err(AppError::bad_params("El bloque debe estar entre 1 y 4"));
    }
    if !entry.score.is_finite() {
        return Err(AppError::bad_params("Puntaje inválido"));
    }
    let student_name = entry.student_name.trim();
    let grade_level = entry.grade_level.trim();

    let student = school::find_student_in_grade(conn, student_name, grade_level)?
        .ok_or_else(|| AppError::not_found("Alumno no encontrado en ese grado"))?;

    let assignment = school::find_assignment(conn, teacher_id, entry.subject_id, grade_level)?
        .ok_or_else(|| AppError::not_authorized("No autorizado"))?;

    if find_slot(conn, student.id, &assignment.subject_name, entry.block)?.is_some() {
        return Err(AppError::duplicate("Nota duplicada"));
    }

    conn.execute(
        "INSERT INTO grades(student_id, subject, block, score) VALUES(?, ?, ?, ?)",
        (student.id, &assignment.subject_name, entry.block, entry.score),
    )
    .map_err(|e| on_unique_violation(e, "Nota duplicada"))?;

    let grade = GradeRecord {
        id: conn.last_insert_rowid(),
        student_id: student.id,
        subject: assignment.subject_name,
        block: entry.block,
        score: entry.score,
    };
    Ok(RecordedGrade { student, grade })
}

/// Picks the replacement scores out of an edit form.
///
/// Only `puntaje_<id>` fields naming one of `grades` count; blank values mean
/// "keep". Any non-numeric value rejects the whole form.
pub fn parse_score_edits(
    form: &HashMap<String, String>,
    grades: &[GradeRecord],
) -> AppResult<HashMap<i64, f64>> {
    let mut edits = HashMap::new();
    for grade in grades {
        let key = format!("{SCORE_FIELD_PREFIX}{}", grade.id);
        let Some(raw) = form.get(&key).map(|v| v.trim()) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let score: f64 = raw
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| AppError::bad_params(format!("Puntaje inválido: {raw}")))?;
        edits.insert(grade.id, score);
    }
    Ok(edits)
}

/// Overwrites the given scores of one student in a single transaction.
/// Ids that do not belong to the student are not touched.
pub fn apply_score_edits(
    conn: &Connection,
    student_id: i64,
    edits: &HashMap<i64, f64>,
) -> AppResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare("UPDATE grades SET score = ? WHERE id = ? AND student_id = ?")?;
        for (grade_id, score) in edits {
            updated += stmt.execute((score, grade_id, student_id))?;
        }
    }
    tx.commit()?;
    Ok(updated)
}
