#![allow(dead_code)]

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use cookie::Cookie;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

use gradebookd::accounts::{self, Role};
use gradebookd::config::Config;
use gradebookd::db;
use gradebookd::school::{self, Student, Subject};
use gradebookd::web::{create_router, AppState};

pub const ADMIN_EMAIL: &str = "admin@colegio.com";
pub const ADMIN_PASSWORD: &str = "admin-password-1";
pub const TEACHER_PASSWORD: &str = "docente-password";

pub fn test_config(data_dir: &Path) -> Config {
    Config::from_lookup(data_dir.to_path_buf(), |k| match k {
        "SECRET_KEY" => Some("test-secret-key".to_string()),
        "ADMIN_EMAIL" => Some(ADMIN_EMAIL.to_string()),
        "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.to_string()),
        _ => None,
    })
    .expect("test config")
}

/// Fresh database in `dir` with the admin account and default subjects.
pub fn open_bootstrapped(dir: &Path) -> Connection {
    let conn = db::open_db(dir).expect("open db");
    db::bootstrap(&conn, ADMIN_EMAIL, ADMIN_PASSWORD).expect("bootstrap");
    conn
}

pub fn seed_student(conn: &Connection, name: &str, grade_level: &str) -> Student {
    school::create_student(conn, name, grade_level).expect("create student")
}

pub fn seeded_subject(conn: &Connection, name: &str, grade_level: &str) -> Subject {
    school::list_subjects(conn)
        .expect("list subjects")
        .into_iter()
        .find(|s| s.name == name && s.grade_level == grade_level)
        .expect("seeded subject")
}

pub fn seed_teacher(conn: &Connection, name: &str, email: &str) -> i64 {
    accounts::create_user(conn, name, email, TEACHER_PASSWORD, Role::Teacher)
        .expect("create teacher")
        .id
}

pub fn audit_count(conn: &Connection, action: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE action = ?",
        [action],
        |r| r.get(0),
    )
    .expect("count audit rows")
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub dir: TempDir,
}

pub fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());
    let state = AppState::new(conn, test_config(dir.path()));
    let server = TestServer::new(create_router(state.clone())).expect("test server");
    TestApp { server, state, dir }
}

impl TestApp {
    pub async fn with_db<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.state.db.lock().await;
        f(&conn)
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/")
            .form(&[("correo", email), ("password", password)])
            .await
    }

    /// Logs in and returns the session cookie.
    pub async fn session_for(&self, email: &str, password: &str) -> Cookie<'static> {
        let resp = self.login(email, password).await;
        assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
        resp.cookie("session")
    }

    pub async fn admin_session(&self) -> Cookie<'static> {
        self.session_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }
}

pub fn location(resp: &TestResponse) -> String {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Decodes the flash message a redirect carries.
pub fn flash_of(resp: &TestResponse) -> Option<Value> {
    let cookie = resp.maybe_cookie("flash")?;
    let bytes = hex::decode(cookie.value()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn flash_message(resp: &TestResponse) -> String {
    flash_of(resp)
        .and_then(|f| f["message"].as_str().map(str::to_string))
        .unwrap_or_default()
}
