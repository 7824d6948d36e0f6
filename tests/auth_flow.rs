mod test_support;

use axum::http::StatusCode;
use cookie::Cookie;
use serde_json::Value;
use test_support::*;

#[tokio::test]
async fn admin_and_teacher_land_on_their_pages() {
    let app = spawn_app();
    app.with_db(|conn| seed_teacher(conn, "Ana Docente", "ana@colegio.com"))
        .await;

    let resp = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin");
    assert!(resp.maybe_cookie("session").is_some());

    let resp = app.login("ana@colegio.com", TEACHER_PASSWORD).await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/docente");

    let logins = app.with_db(|conn| audit_count(conn, "LOGIN")).await;
    assert_eq!(logins, 2);
}

#[tokio::test]
async fn wrong_credentials_never_create_a_session() {
    let app = spawn_app();

    for (email, password) in [
        (ADMIN_EMAIL, "not-the-password"),
        ("nadie@colegio.com", ADMIN_PASSWORD),
        ("", ""),
    ] {
        let resp = app.login(email, password).await;
        assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
        assert!(resp.maybe_cookie("session").is_none());
        assert_eq!(flash_message(&resp), "Credenciales incorrectas");
    }
    assert_eq!(app.with_db(|conn| audit_count(conn, "LOGIN")).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_logins_are_resolved_independently() {
    let app = spawn_app();
    app.with_db(|conn| seed_teacher(conn, "Ana Docente", "ana@colegio.com"))
        .await;

    let (admin, teacher, wrong, again) = tokio::join!(
        app.login(ADMIN_EMAIL, ADMIN_PASSWORD),
        app.login("ana@colegio.com", TEACHER_PASSWORD),
        app.login(ADMIN_EMAIL, TEACHER_PASSWORD),
        app.login(ADMIN_EMAIL, ADMIN_PASSWORD),
    );
    assert_eq!(location(&admin), "/admin");
    assert_eq!(location(&teacher), "/docente");
    assert_eq!(location(&wrong), "/");
    assert!(wrong.maybe_cookie("session").is_none());
    assert_eq!(location(&again), "/admin");

    assert_eq!(app.with_db(|conn| audit_count(conn, "LOGIN")).await, 3);
}

#[tokio::test]
async fn login_page_consumes_the_flash_message() {
    let app = spawn_app();
    let failed = app.login(ADMIN_EMAIL, "wrong-password").await;
    let flash = failed.cookie("flash");

    let page = app.server.get("/").add_cookie(flash).await;
    page.assert_status_ok();
    let body: Value = page.json();
    assert_eq!(body["flash"]["kind"], "error");
    assert_eq!(body["flash"]["message"], "Credenciales incorrectas");
    let cleared = page.cookie("flash");
    assert_eq!(cleared.value(), "");

    // Without the cookie there is nothing to show.
    let page = app.server.get("/").await;
    let body: Value = page.json();
    assert!(body.get("flash").is_none());
}

#[tokio::test]
async fn role_gate_redirects_before_the_handler_runs() {
    let app = spawn_app();
    app.with_db(|conn| seed_teacher(conn, "Ana Docente", "ana@colegio.com"))
        .await;

    // No session at all; the body is not even a valid form.
    let resp = app.server.post("/admin/alumnos").text("%%%").await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let teacher = app.session_for("ana@colegio.com", TEACHER_PASSWORD).await;
    for path in ["/admin", "/admin/alumnos", "/admin/reporte/1", "/admin/cambiar_password"] {
        let resp = app.server.get(path).add_cookie(teacher.clone()).await;
        assert_eq!(resp.status_code(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&resp), "/", "{path}");
    }

    let resp = app
        .server
        .post("/admin/alumnos")
        .add_cookie(teacher)
        .form(&[("nombre", "Intruso"), ("grado", "Primero Primaria")])
        .await;
    assert_eq!(location(&resp), "/");
    let students = app
        .with_db(|conn| gradebookd::school::list_students(conn).expect("list"))
        .await;
    assert!(students.is_empty());

    let admin = app.admin_session().await;
    let resp = app.server.get("/docente").add_cookie(admin).await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn tampered_session_cookie_counts_as_absent() {
    let app = spawn_app();
    let session = app.admin_session().await;

    let forged_value = format!("9{}", session.value());
    let forged = Cookie::new("session", forged_value);
    let resp = app.server.get("/admin").add_cookie(forged).await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    let resp = app.server.get("/admin").add_cookie(session).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["user"]["email"], ADMIN_EMAIL);
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn logout_clears_the_session_and_is_audited() {
    let app = spawn_app();
    let session = app.admin_session().await;

    let resp = app.server.get("/logout").add_cookie(session).await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert_eq!(resp.cookie("session").value(), "");
    assert_eq!(app.with_db(|conn| audit_count(conn, "LOGOUT")).await, 1);

    let resp = app.server.get("/logout").await;
    assert_eq!(location(&resp), "/");
    assert_eq!(app.with_db(|conn| audit_count(conn, "LOGOUT")).await, 1);
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app();
    let resp = app.server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
