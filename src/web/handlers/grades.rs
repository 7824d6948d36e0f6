use axum::extract::{Form, Path, State};
use axum::response::Response;
use std::collections::{BTreeMap, HashMap};

use crate::audit::{self, AuditAction};
use crate::error::{AppError, AppResult};
use crate::grades::{self, GradeEntry};
use crate::school;
use crate::web::error::flash_failure;
use crate::web::flash::{self, Flash, IncomingFlash};
use crate::web::session::{AdminUser, TeacherUser};
use crate::web::types::{AssignedSubject, EditGradesView, GradeForm, TeacherHomeView};
use crate::web::AppState;

use super::{parse_field, ADMIN_HOME, TEACHER_HOME};

pub async fn teacher_home(
    State(state): State<AppState>,
    TeacherUser(teacher): TeacherUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let assignments = school::assignments_for_teacher(&conn, teacher.id)?;
    drop(conn);

    let mut subjects_by_grade: BTreeMap<String, Vec<AssignedSubject>> = BTreeMap::new();
    for a in assignments {
        subjects_by_grade
            .entry(a.grade_level)
            .or_default()
            .push(AssignedSubject {
                id: a.subject_id,
                name: a.subject_name,
            });
    }
    let view = TeacherHomeView {
        user: teacher,
        grade_levels: subjects_by_grade.keys().cloned().collect(),
        subjects_by_grade,
    };
    Ok(flash::render(incoming, view))
}

fn entry_from_form(form: &GradeForm) -> AppResult<GradeEntry> {
    Ok(GradeEntry {
        student_name: form.nombre.clone(),
        grade_level: form.grado.clone(),
        subject_id: parse_field(&form.materia_id, "Materia")?,
        block: parse_field(&form.bloque, "Bloque")?,
        score: parse_field(&form.puntaje, "Puntaje")?,
    })
}

pub async fn submit_grade(
    State(state): State<AppState>,
    TeacherUser(teacher): TeacherUser,
    Form(form): Form<GradeForm>,
) -> Response {
    let conn = state.db.lock().await;
    let result = entry_from_form(&form)
        .and_then(|entry| grades::submit_grade(&conn, teacher.id, &entry));
    match result {
        Ok(recorded) => {
            audit::record(&conn, teacher.id, AuditAction::CreateGrade, &recorded.student.name);
            tracing::info!(
                teacher_id = teacher.id,
                student_id = recorded.student.id,
                subject = %recorded.grade.subject,
                block = recorded.grade.block,
                "grade recorded"
            );
            flash::redirect_with(TEACHER_HOME, Flash::success("Nota registrada"))
        }
        Err(e) => flash_failure(e, TEACHER_HOME),
    }
}

fn edit_page_path(student_id: i64) -> String {
    format!("/admin/editar_notas/{student_id}")
}

pub async fn edit_page(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<i64>,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let student = school::find_student(&conn, student_id)?
        .ok_or_else(|| AppError::not_found("Alumno no encontrado"))?;
    let grades = grades::grades_for_student(&conn, student.id)?;
    Ok(flash::render(incoming, EditGradesView { student, grades }))
}

pub async fn edit_submit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(student_id): Path<i64>,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let student = school::find_student(&conn, student_id)?
        .ok_or_else(|| AppError::not_found("Alumno no encontrado"))?;
    let current = grades::grades_for_student(&conn, student.id)?;

    let updated = match grades::parse_score_edits(&form, &current)
        .and_then(|edits| grades::apply_score_edits(&conn, student.id, &edits))
    {
        Ok(n) => n,
        Err(e) => return Ok(flash_failure(e, &edit_page_path(student.id))),
    };

    audit::record(&conn, admin.id, AuditAction::EditGrades, &student.name);
    tracing::info!(student_id = student.id, updated, "grades edited");
    Ok(flash::redirect_with(
        ADMIN_HOME,
        Flash::success("Notas actualizadas correctamente"),
    ))
}
