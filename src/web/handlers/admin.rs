//! Admin listing pages and the forms that create school structure.

use axum::extract::{Form, State};
use axum::response::Response;

use crate::accounts::{self, Role};
use crate::audit::{self, AuditAction};
use crate::error::AppResult;
use crate::school;
use crate::web::error::flash_failure;
use crate::web::flash::{self, Flash, IncomingFlash};
use crate::web::session::AdminUser;
use crate::web::types::{
    AssignmentForm, AssignmentsView, DashboardView, NameGradeForm, StudentsView, SubjectsView,
    TeacherForm, TeachersView,
};
use crate::web::AppState;

use super::{parse_field, ASSIGNMENTS_PAGE, STUDENTS_PAGE, SUBJECTS_PAGE, TEACHERS_PAGE};

pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let view = DashboardView {
        user: admin,
        students: school::list_students(&conn)?,
        grade_levels: school::grade_levels(&conn)?,
    };
    Ok(flash::render(incoming, view))
}

// =============================================================================
// TEACHERS
// =============================================================================

pub async fn teachers_page(
    State(state): State<AppState>,
    _admin: AdminUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let teachers = accounts::list_by_role(&conn, Role::Teacher)?;
    Ok(flash::render(incoming, TeachersView { teachers }))
}

pub async fn create_teacher(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<TeacherForm>,
) -> Response {
    let conn = state.db.lock().await;
    match accounts::create_user(&conn, &form.nombre, &form.correo, &form.password, Role::Teacher) {
        Ok(teacher) => {
            audit::record(&conn, admin.id, AuditAction::CreateTeacher, &teacher.email);
            tracing::info!(teacher_id = teacher.id, "teacher account created");
            flash::redirect_with(TEACHERS_PAGE, Flash::success("Docente creado correctamente"))
        }
        Err(e) => flash_failure(e, TEACHERS_PAGE),
    }
}

// =============================================================================
// SUBJECTS
// =============================================================================

pub async fn subjects_page(
    State(state): State<AppState>,
    _admin: AdminUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let subjects = school::list_subjects(&conn)?;
    Ok(flash::render(incoming, SubjectsView { subjects }))
}

pub async fn create_subject(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<NameGradeForm>,
) -> Response {
    let conn = state.db.lock().await;
    match school::create_subject(&conn, &form.nombre, &form.grado) {
        Ok(subject) => {
            let detail = format!("{} - {}", subject.name, subject.grade_level);
            audit::record(&conn, admin.id, AuditAction::CreateSubject, &detail);
            flash::redirect_with(SUBJECTS_PAGE, Flash::success("Materia creada correctamente"))
        }
        Err(e) => flash_failure(e, SUBJECTS_PAGE),
    }
}

// =============================================================================
// STUDENTS
// =============================================================================

pub async fn students_page(
    State(state): State<AppState>,
    _admin: AdminUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let students = school::list_students(&conn)?;
    Ok(flash::render(incoming, StudentsView { students }))
}

pub async fn create_student(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<NameGradeForm>,
) -> Response {
    let conn = state.db.lock().await;
    match school::create_student(&conn, &form.nombre, &form.grado) {
        Ok(student) => {
            audit::record(&conn, admin.id, AuditAction::CreateStudent, &student.name);
            flash::redirect_with(STUDENTS_PAGE, Flash::success("Alumno registrado correctamente"))
        }
        Err(e) => flash_failure(e, STUDENTS_PAGE),
    }
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

pub async fn assignments_page(
    State(state): State<AppState>,
    _admin: AdminUser,
    incoming: IncomingFlash,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let view = AssignmentsView {
        teachers: accounts::list_by_role(&conn, Role::Teacher)?,
        subjects: school::list_subjects(&conn)?,
        assignments: school::list_assignments(&conn)?,
    };
    Ok(flash::render(incoming, view))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<AssignmentForm>,
) -> Response {
    let conn = state.db.lock().await;
    let result = parse_field::<i64>(&form.docente_id, "Docente").and_then(|teacher_id| {
        let subject_id = parse_field::<i64>(&form.materia_id, "Materia")?;
        school::create_assignment(&conn, teacher_id, subject_id, &form.grado)
    });
    match result {
        Ok(assignment) => {
            let detail = format!("Docente {}", assignment.teacher_id);
            audit::record(&conn, admin.id, AuditAction::AssignSubject, &detail);
            flash::redirect_with(ASSIGNMENTS_PAGE, Flash::success("Materia asignada correctamente"))
        }
        Err(e) => flash_failure(e, ASSIGNMENTS_PAGE),
    }
}
