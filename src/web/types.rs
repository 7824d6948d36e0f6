use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accounts::User;
use crate::grades::GradeRecord;
use crate::school::{Assignment, Student, Subject};

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub correo: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TeacherForm {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub correo: String,
    #[serde(default)]
    pub password: String,
}

/// Shared by the student and subject forms.
#[derive(Debug, Deserialize)]
pub struct NameGradeForm {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub grado: String,
}

// Numeric fields arrive as text so a malformed value can be flashed back
// instead of failing extraction.

#[derive(Debug, Deserialize)]
pub struct AssignmentForm {
    #[serde(default)]
    pub docente_id: String,
    #[serde(default)]
    pub materia_id: String,
    #[serde(default)]
    pub grado: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeForm {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub grado: String,
    #[serde(default)]
    pub materia_id: String,
    #[serde(default)]
    pub bloque: String,
    #[serde(default)]
    pub puntaje: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub actual: String,
    #[serde(default)]
    pub nueva: String,
    #[serde(default)]
    pub confirmar: String,
}

// =============================================================================
// PAGES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub page: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub user: User,
    pub students: Vec<Student>,
    pub grade_levels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TeachersView {
    pub teachers: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct SubjectsView {
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Serialize)]
pub struct StudentsView {
    pub students: Vec<Student>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentsView {
    pub teachers: Vec<User>,
    pub subjects: Vec<Subject>,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize)]
pub struct AssignedSubject {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TeacherHomeView {
    pub user: User,
    pub grade_levels: Vec<String>,
    pub subjects_by_grade: BTreeMap<String, Vec<AssignedSubject>>,
}

#[derive(Debug, Serialize)]
pub struct EditGradesView {
    pub student: Student,
    pub grades: Vec<GradeRecord>,
}

#[derive(Debug, Serialize)]
pub struct PasswordView {
    pub min_length: usize,
}
