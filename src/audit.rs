use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    ChangePassword,
    CreateTeacher,
    CreateSubject,
    CreateStudent,
    AssignSubject,
    CreateGrade,
    EditGrades,
    DownloadZip,
}

impl AuditAction {
    /// Tag stored in `audit_log.action`.
    pub fn tag(self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::ChangePassword => "CAMBIO_PASSWORD",
            AuditAction::CreateTeacher => "CREAR_DOCENTE",
            AuditAction::CreateSubject => "CREAR_MATERIA",
            AuditAction::CreateStudent => "CREAR_ALUMNO",
            AuditAction::AssignSubject => "ASIGNAR_MATERIA",
            AuditAction::CreateGrade => "CREAR_NOTA",
            AuditAction::EditGrades => "EDITAR_NOTAS",
            AuditAction::DownloadZip => "DESCARGA_ZIP",
        }
    }
}

/// Appends one audit entry. Never fails the caller: the action being
/// audited has already committed by the time this runs.
pub fn record(conn: &Connection, user_id: i64, action: AuditAction, description: &str) {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Err(e) = conn.execute(
        "INSERT INTO audit_log(user_id, action, description, created_at) VALUES(?, ?, ?, ?)",
        (user_id, action.tag(), description, &now),
    ) {
        tracing::warn!(
            user_id,
            action = action.tag(),
            error = %e,
            "failed to write audit entry"
        );
    }
}
