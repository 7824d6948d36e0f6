pub mod accounts;
pub mod admin;
pub mod grades;
pub mod reports;

pub const ADMIN_HOME: &str = "/admin";
pub const TEACHER_HOME: &str = "/docente";
pub const TEACHERS_PAGE: &str = "/admin/crear_docente";
pub const SUBJECTS_PAGE: &str = "/admin/materias";
pub const STUDENTS_PAGE: &str = "/admin/alumnos";
pub const ASSIGNMENTS_PAGE: &str = "/admin/asignaciones";
pub const PASSWORD_PAGE: &str = "/admin/cambiar_password";

/// Parses a numeric form field, naming the field in the rejection.
pub(crate) fn parse_field<T: std::str::FromStr>(
    raw: &str,
    label: &str,
) -> crate::error::AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| crate::error::AppError::bad_params(format!("{label} inválido")))
}
