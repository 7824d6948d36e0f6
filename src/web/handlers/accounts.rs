use axum::extract::{Form, State};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Json, Redirect, Response};

use crate::accounts::{self, MIN_PASSWORD_LEN};
use crate::audit::{self, AuditAction};
use crate::error::AppError;
use crate::web::error::flash_failure;
use crate::web::flash::{self, Flash, IncomingFlash};
use crate::web::session::{removal_cookie, AdminUser, CurrentUser, LOGIN_PATH, SESSION_COOKIE};
use crate::web::types::{HealthResponse, LoginForm, LoginView, PasswordForm, PasswordView};
use crate::web::AppState;

use super::{ADMIN_HOME, PASSWORD_PAGE};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn login_page(incoming: IncomingFlash) -> Response {
    flash::render(incoming, LoginView { page: "login" })
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let found = {
        let conn = state.db.lock().await;
        accounts::find_by_email(&conn, form.correo.trim())
    };
    let found = match found {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    // argon2 runs on the blocking pool, outside the database lock.
    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || {
        found.filter(|u| u.check_password(&password))
    })
    .await;
    let user = match verified {
        Ok(user) => user,
        Err(e) => return AppError::Internal(e.into()).into_response(),
    };
    let Some(user) = user else {
        tracing::warn!(event = "auth_failure", email = %form.correo.trim(), "login rejected");
        return flash::redirect_with(LOGIN_PATH, Flash::error("Credenciales incorrectas"));
    };

    let conn = state.db.lock().await;
    audit::record(&conn, user.id, AuditAction::Login, &user.email);
    tracing::info!(user_id = user.id, role = user.role.as_str(), "user logged in");

    (
        AppendHeaders([(SET_COOKIE, state.sessions.cookie(user.id))]),
        Redirect::to(user.role.landing_path()),
    )
        .into_response()
}

pub async fn logout(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    let conn = state.db.lock().await;
    audit::record(&conn, user.id, AuditAction::Logout, &user.email);
    tracing::info!(user_id = user.id, "user logged out");

    (
        AppendHeaders([(SET_COOKIE, removal_cookie(SESSION_COOKIE))]),
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

pub async fn password_page(_admin: AdminUser, incoming: IncomingFlash) -> Response {
    flash::render(
        incoming,
        PasswordView {
            min_length: MIN_PASSWORD_LEN,
        },
    )
}

pub async fn change_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Form(form): Form<PasswordForm>,
) -> Response {
    let conn = state.db.lock().await;
    match accounts::change_password(&conn, &admin, &form.actual, &form.nueva, &form.confirmar) {
        Ok(()) => {
            audit::record(&conn, admin.id, AuditAction::ChangePassword, &admin.email);
            tracing::info!(user_id = admin.id, "password changed");
            flash::redirect_with(ADMIN_HOME, Flash::success("Contraseña actualizada correctamente"))
        }
        Err(e) => flash_failure(e, PASSWORD_PAGE),
    }
}
