//! Signed session cookies and the role gate.
//!
//! The cookie value is `<user id>.<issued at, unix secs>.<hex HMAC-SHA256>`
//! keyed by `SECRET_KEY`. Nothing is stored server-side: a cookie is valid
//! while its signature verifies, it has not expired, and the user it names
//! still exists.

use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::extract::FromRequestParts;
use axum::response::Redirect;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::AppState;
use crate::accounts::{self, Role, User};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const LOGIN_PATH: &str = "/";

#[derive(Clone)]
pub struct SessionSigner {
    key: Arc<[u8]>,
    ttl_secs: u64,
}

impl SessionSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            key: Arc::from(secret),
            ttl_secs,
        }
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        // HMAC is defined for keys of any length.
        let mut mac = match HmacSha256::new_from_slice(&self.key) {
            Ok(m) => m,
            Err(_) => unreachable!("HMAC accepts any key length"),
        };
        mac.update(payload.as_bytes());
        mac
    }

    pub fn issue(&self, user_id: i64, issued_at: u64) -> String {
        let payload = format!("{user_id}.{issued_at}");
        let tag = hex::encode(self.mac(&payload).finalize().into_bytes());
        format!("{payload}.{tag}")
    }

    /// Returns the user id of a well-formed, authentic, unexpired value.
    pub fn verify(&self, value: &str, now: u64) -> Option<i64> {
        let mut parts = value.splitn(3, '.');
        let user_id: i64 = parts.next()?.parse().ok()?;
        let issued_at: u64 = parts.next()?.parse().ok()?;
        let tag = hex::decode(parts.next()?).ok()?;

        self.mac(&format!("{user_id}.{issued_at}"))
            .verify_slice(&tag)
            .ok()?;

        if issued_at > now.saturating_add(60) || now.saturating_sub(issued_at) > self.ttl_secs {
            return None;
        }
        Some(user_id)
    }

    pub fn cookie(&self, user_id: i64) -> String {
        Cookie::build((SESSION_COOKIE, self.issue(user_id, unix_now())))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.ttl_secs as i64))
            .build()
            .to_string()
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `Set-Cookie` value that makes the browser drop `name`.
pub fn removal_cookie(name: &str) -> String {
    Cookie::build((name, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build()
        .to_string()
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

fn login_redirect() -> Redirect {
    Redirect::to(LOGIN_PATH)
}

/// Any logged-in user.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = cookie_value(&parts.headers, SESSION_COOKIE).ok_or_else(login_redirect)?;
        let Some(user_id) = state.sessions.verify(&value, unix_now()) else {
            tracing::debug!(path = %parts.uri.path(), "rejected invalid or expired session");
            return Err(login_redirect());
        };

        let conn = state.db.lock().await;
        match accounts::find_by_id(&conn, user_id) {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => Err(login_redirect()),
            Err(e) => {
                tracing::error!(user_id, error = %e, "failed to load session user");
                Err(login_redirect())
            }
        }
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: Role,
) -> Result<User, Redirect> {
    let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
    if user.role != role {
        tracing::warn!(
            event = "auth_failure",
            user_id = user.id,
            required = role.as_str(),
            path = %parts.uri.path(),
            "role check failed"
        );
        return Err(login_redirect());
    }
    Ok(user)
}

pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(AdminUser)
    }
}

pub struct TeacherUser(pub User);

impl FromRequestParts<AppState> for TeacherUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Teacher).await.map(TeacherUser)
    }
}
