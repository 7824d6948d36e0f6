use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::audit::{self, AuditAction};
use crate::error::{AppError, AppResult};
use crate::export;
use crate::grades;
use crate::report;
use crate::school;
use crate::web::flash::{self, Flash};
use crate::web::session::AdminUser;
use crate::web::AppState;

use super::ADMIN_HOME;

/// Percent-encodes for the RFC 5987 `filename*` parameter.
fn encode_ext_value(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        encode_ext_value(file_name)
    )
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        body,
    )
        .into_response()
}

/// Runs artifact generation on the blocking pool while holding the artifact
/// lock, so concurrent requests never interleave writes to the same file.
async fn generate<T, F>(state: &AppState, job: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let guard = state.artifacts.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        job()
    })
    .await
    .context("artifact generation task failed")?
}

pub async fn report_card(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let student = school::find_student(&conn, student_id)?
        .ok_or_else(|| AppError::not_found("Alumno no encontrado"))?;
    let grades = grades::grades_for_student(&conn, student.id)?;
    drop(conn);

    if grades.is_empty() {
        return Ok(flash::redirect_with(
            ADMIN_HOME,
            Flash::error("El alumno no tiene notas registradas"),
        ));
    }

    let file_name = report::artifact_file_name(&student.name, state.config.report.school_year);
    let config = state.config.clone();
    let written = generate(&state, move || {
        report::write_report_card(&config.pdf_dir(), &config.report, &student, &grades)
    })
    .await?;
    Ok(attachment("application/pdf", &file_name, written.bytes))
}

pub async fn download_grade_level(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(grade_level): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.lock().await;
    let mut roster = Vec::new();
    for student in school::students_in_grade(&conn, &grade_level)? {
        let grades = grades::grades_for_student(&conn, student.id)?;
        roster.push((student, grades));
    }
    drop(conn);

    let config = state.config.clone();
    let level = grade_level.clone();
    let summary = generate(&state, move || {
        export::export_grade_level(
            &config.pdf_dir(),
            &config.zip_dir(),
            &config.report,
            &level,
            &roster,
        )
    })
    .await?;

    let conn = state.db.lock().await;
    audit::record(&conn, admin.id, AuditAction::DownloadZip, &grade_level);
    drop(conn);

    let file_name = format!("{}.zip", report::path_component(&grade_level));
    Ok(attachment("application/zip", &file_name, summary.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_ascii_and_encodes_the_rest() {
        let value = content_disposition("José_Pérez_2026.pdf");
        assert_eq!(
            value,
            "attachment; filename=\"Jos__P_rez_2026.pdf\"; \
             filename*=UTF-8''Jos%C3%A9_P%C3%A9rez_2026.pdf"
        );
    }
}
