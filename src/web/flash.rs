//! One-shot messages carried across a POST/redirect/GET cycle.
//!
//! A POST handler stores a [`Flash`] in the `flash` cookie and answers with a
//! 303. The next page render embeds it in its body and clears the cookie.

use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{AppendHeaders, IntoResponse, Json, Redirect, Response};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use super::session::{cookie_value, removal_cookie};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// Cookie values can't hold arbitrary UTF-8, so the JSON is hex-encoded.
    fn encode(&self) -> String {
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    fn decode(value: &str) -> Option<Self> {
        let bytes = hex::decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn set_cookie(&self) -> String {
        Cookie::build((FLASH_COOKIE, self.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
            .to_string()
    }
}

/// 303 to `to`, carrying `flash`.
pub fn redirect_with(to: &str, flash: Flash) -> Response {
    (
        AppendHeaders([(SET_COOKIE, flash.set_cookie())]),
        Redirect::to(to),
    )
        .into_response()
}

/// The pending message of the current request, if any.
#[derive(Debug, Default)]
pub struct IncomingFlash(pub Option<Flash>);

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            cookie_value(&parts.headers, FLASH_COOKIE).and_then(|v| Flash::decode(&v)),
        ))
    }
}

#[derive(Debug, Serialize)]
struct Page<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    flash: Option<Flash>,
    #[serde(flatten)]
    view: T,
}

/// Renders a page view model, consuming the pending flash message.
pub fn render<T: Serialize>(incoming: IncomingFlash, view: T) -> Response {
    let consumed = incoming.0.is_some();
    let body = Json(Page {
        flash: incoming.0,
        view,
    });
    if consumed {
        (AppendHeaders([(SET_COOKIE, removal_cookie(FLASH_COOKIE))]), body).into_response()
    } else {
        body.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_survives_non_ascii_messages() {
        let flash = Flash::error("Asignación duplicada");
        let decoded = Flash::decode(&flash.encode()).expect("decode");
        assert_eq!(decoded, flash);
    }

    #[test]
    fn corrupt_cookie_is_ignored() {
        assert_eq!(Flash::decode("zz"), None);
        assert_eq!(Flash::decode(&hex::encode(b"not json")), None);
    }
}
