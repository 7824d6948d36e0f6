//! # HTTP surface
//!
//! Pages answer `GET` with their JSON view model; forms answer `POST` with a
//! 303 redirect and a flash message.
//!
//! ## Endpoints
//!
//! - `GET|POST /` - Login
//! - `GET /health` - Liveness
//! - `GET /logout` - End the session (any role)
//! - `GET /admin` - Students and grade-levels (admin)
//! - `GET|POST /admin/crear_docente` - Teacher accounts (admin)
//! - `GET|POST /admin/materias` - Subjects (admin)
//! - `GET|POST /admin/alumnos` - Students (admin)
//! - `GET|POST /admin/asignaciones` - Teacher/subject assignments (admin)
//! - `GET|POST /admin/editar_notas/{id}` - Overwrite a student's scores (admin)
//! - `GET /admin/reporte/{id}` - Report card PDF (admin)
//! - `GET /admin/descargar_grado/{grade}` - Zip of a grade-level's report cards (admin)
//! - `GET|POST /admin/cambiar_password` - Change own password (admin)
//! - `GET|POST /docente` - Assigned subjects and grade entry (teacher)

mod error;
mod flash;
mod handlers;
mod session;
mod types;

pub use error::ErrorResponse;
pub use flash::{Flash, FlashKind, FLASH_COOKIE};
pub use session::{SessionSigner, SESSION_COOKIE};

use axum::routing::get;
use axum::Router;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Every request touching the database holds this lock for its whole
    /// database section.
    pub db: Arc<Mutex<Connection>>,
    pub config: Arc<Config>,
    pub sessions: SessionSigner,
    /// Serializes writers of the shared PDF and zip artifact directories.
    pub artifacts: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(conn: Connection, config: Config) -> Self {
        let sessions = SessionSigner::new(config.secret_key.as_bytes(), config.session_ttl_secs);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            sessions,
            artifacts: Arc::new(Mutex::new(())),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    use handlers::{accounts, admin, grades, reports};

    Router::new()
        .route("/", get(accounts::login_page).post(accounts::login))
        .route("/health", get(accounts::health))
        .route("/logout", get(accounts::logout))
        .route("/admin", get(admin::dashboard))
        .route(
            "/admin/crear_docente",
            get(admin::teachers_page).post(admin::create_teacher),
        )
        .route(
            "/admin/materias",
            get(admin::subjects_page).post(admin::create_subject),
        )
        .route(
            "/admin/alumnos",
            get(admin::students_page).post(admin::create_student),
        )
        .route(
            "/admin/asignaciones",
            get(admin::assignments_page).post(admin::create_assignment),
        )
        .route(
            "/admin/editar_notas/{id}",
            get(grades::edit_page).post(grades::edit_submit),
        )
        .route("/admin/reporte/{id}", get(reports::report_card))
        .route(
            "/admin/descargar_grado/{grade}",
            get(reports::download_grade_level),
        )
        .route(
            "/admin/cambiar_password",
            get(accounts::password_page).post(accounts::change_password),
        )
        .route(
            "/docente",
            get(grades::teacher_home).post(grades::submit_grade),
        )
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {addr} failed: {e}"))?;

    tracing::info!("gradebookd listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
