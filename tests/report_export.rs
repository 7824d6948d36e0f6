mod test_support;

use axum::http::StatusCode;
use axum_test::TestResponse;
use cookie::Cookie;
use rusqlite::Connection;
use std::io::Cursor;
use test_support::*;

use gradebookd::export;
use gradebookd::grades::{self, GradeEntry};
use gradebookd::report::ReportSettings;
use gradebookd::school;

const GRADE: &str = "Primero Primaria";

fn grade(conn: &Connection, teacher: i64, subject_id: i64, student: &str, block: u8, score: f64) {
    let entry = GradeEntry {
        student_name: student.to_string(),
        grade_level: GRADE.to_string(),
        subject_id,
        block,
        score,
    };
    grades::submit_grade(conn, teacher, &entry).expect("submit grade");
}

/// Three students in the grade-level, two of them graded.
fn seed(conn: &Connection) -> Vec<i64> {
    let teacher = seed_teacher(conn, "Ana Docente", "ana@colegio.com");
    let math = seeded_subject(conn, "Matemática", GRADE).id;
    let language = seeded_subject(conn, "Lenguaje", GRADE).id;
    school::create_assignment(conn, teacher, math, GRADE).expect("assign math");
    school::create_assignment(conn, teacher, language, GRADE).expect("assign language");

    let ids = ["María López", "Pedro Gómez", "Sin Notas"]
        .iter()
        .map(|n| seed_student(conn, n, GRADE).id)
        .collect();
    grade(conn, teacher, math, "María López", 1, 80.0);
    grade(conn, teacher, math, "María López", 2, 90.0);
    grade(conn, teacher, math, "María López", 3, 100.0);
    grade(conn, teacher, language, "Pedro Gómez", 1, 75.0);
    ids
}

#[test]
fn export_contains_only_graded_students() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());
    seed(&conn);

    let roster: Vec<_> = school::students_in_grade(&conn, GRADE)
        .expect("students")
        .into_iter()
        .map(|s| {
            let g = grades::grades_for_student(&conn, s.id).expect("grades");
            (s, g)
        })
        .collect();
    assert_eq!(roster.len(), 3);

    let summary = export::export_grade_level(
        &dir.path().join("pdfs"),
        &dir.path().join("zip_temp"),
        &ReportSettings::default(),
        GRADE,
        &roster,
    )
    .expect("export");
    assert_eq!(summary.entry_count, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        summary.archive_path,
        dir.path().join("zip_temp").join("Primero Primaria.zip")
    );

    let on_disk = std::fs::read(&summary.archive_path).expect("read archive file");
    assert_eq!(on_disk, summary.bytes);
    let mut archive = zip::ZipArchive::new(Cursor::new(on_disk)).expect("read archive");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, ["María_López_2026.pdf", "Pedro_Gómez_2026.pdf"]);

    let entry = archive.by_name("María_López_2026.pdf").expect("entry");
    assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);
}

#[test]
fn empty_grade_level_yields_an_empty_archive() {
    let dir = tempfile::tempdir().expect("temp dir");
    let summary = export::export_grade_level(
        &dir.path().join("pdfs"),
        &dir.path().join("zip_temp"),
        &ReportSettings::default(),
        "Tercero Primaria",
        &[],
    )
    .expect("export");
    assert_eq!(summary.entry_count, 0);

    let file = std::fs::File::open(&summary.archive_path).expect("open archive");
    let archive = zip::ZipArchive::new(file).expect("read archive");
    assert_eq!(archive.len(), 0);
}

#[tokio::test]
async fn report_card_is_served_as_pdf_attachment() {
    let app = spawn_app();
    let ids = app.with_db(seed).await;
    let admin = app.admin_session().await;

    let resp = app
        .server
        .get(&format!("/admin/reporte/{}", ids[0]))
        .add_cookie(admin.clone())
        .await;
    resp.assert_status_ok();
    let headers = resp.headers();
    assert_eq!(headers["content-type"], "application/pdf");
    let disposition = headers["content-disposition"].to_str().expect("ascii header");
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("Mar%C3%ADa_L%C3%B3pez_2026.pdf"));
    assert!(resp.as_bytes().starts_with(b"%PDF-"));

    let artifact = app
        .dir
        .path()
        .join("pdfs")
        .join(GRADE)
        .join("María_López_2026.pdf");
    assert!(artifact.is_file());

    // Regenerating overwrites the same artifact.
    app.server
        .get(&format!("/admin/reporte/{}", ids[0]))
        .add_cookie(admin)
        .await
        .assert_status_ok();
    let dir_entries = std::fs::read_dir(app.dir.path().join("pdfs").join(GRADE))
        .expect("pdf dir")
        .count();
    assert_eq!(dir_entries, 1);
}

#[tokio::test]
async fn report_for_ungraded_or_unknown_student() {
    let app = spawn_app();
    let ids = app.with_db(seed).await;
    let admin = app.admin_session().await;

    let resp = app
        .server
        .get(&format!("/admin/reporte/{}", ids[2]))
        .add_cookie(admin.clone())
        .await;
    assert_eq!(resp.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin");
    assert_eq!(flash_message(&resp), "El alumno no tiene notas registradas");

    let resp = app
        .server
        .get("/admin/reporte/4040")
        .add_cookie(admin)
        .await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grade_level_download_is_a_zip_attachment() {
    let app = spawn_app();
    app.with_db(seed).await;
    let admin = app.admin_session().await;

    let resp = app
        .server
        .get("/admin/descargar_grado/Primero%20Primaria")
        .add_cookie(admin)
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.headers()["content-type"], "application/zip");

    let archive = zip::ZipArchive::new(Cursor::new(resp.as_bytes().to_vec())).expect("zip body");
    assert_eq!(archive.len(), 2);
    assert_eq!(
        app.with_db(|conn| audit_count(conn, "DESCARGA_ZIP")).await,
        1
    );
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("valid archive");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn names_that_normalize_alike_get_separate_entries() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());
    let teacher = seed_teacher(&conn, "Ana Docente", "ana@colegio.com");
    let math = seeded_subject(&conn, "Matemática", GRADE).id;
    school::create_assignment(&conn, teacher, math, GRADE).expect("assign");
    let spaced = seed_student(&conn, "Ana María", GRADE);
    let underscored = seed_student(&conn, "Ana_María", GRADE);
    grade(&conn, teacher, math, "Ana María", 1, 70.0);
    grade(&conn, teacher, math, "Ana_María", 1, 95.0);

    let roster: Vec<_> = [spaced, underscored.clone()]
        .into_iter()
        .map(|s| {
            let g = grades::grades_for_student(&conn, s.id).expect("grades");
            (s, g)
        })
        .collect();
    let pdfs = dir.path().join("pdfs");
    let summary = export::export_grade_level(
        &pdfs,
        &dir.path().join("zip_temp"),
        &ReportSettings::default(),
        GRADE,
        &roster,
    )
    .expect("export");

    let second = format!("Ana_María_2026_{}.pdf", underscored.id);
    assert_eq!(summary.entry_count, 2);
    assert_eq!(
        entry_names(&summary.bytes),
        ["Ana_María_2026.pdf".to_string(), second.clone()]
    );
    assert!(pdfs.join(GRADE).join("Ana_María_2026.pdf").is_file());
    assert!(pdfs.join(GRADE).join(&second).is_file());
}

#[test]
fn parallel_exports_never_see_a_torn_archive() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());
    seed(&conn);
    let roster: Vec<_> = school::students_in_grade(&conn, GRADE)
        .expect("students")
        .into_iter()
        .map(|s| {
            let g = grades::grades_for_student(&conn, s.id).expect("grades");
            (s, g)
        })
        .collect();
    let pdfs = dir.path().join("pdfs");
    let zips = dir.path().join("zip_temp");
    let settings = ReportSettings::default();

    std::thread::scope(|scope| {
        let workers: Vec<_> = (0..6)
            .map(|_| {
                scope.spawn(|| {
                    export::export_grade_level(&pdfs, &zips, &settings, GRADE, &roster)
                        .expect("export")
                })
            })
            .collect();
        for worker in workers {
            let summary = worker.join().expect("export thread");
            assert_eq!(entry_names(&summary.bytes).len(), 2);
        }
    });

    let on_disk = std::fs::read(zips.join("Primero Primaria.zip")).expect("archive");
    assert_eq!(entry_names(&on_disk).len(), 2);
    // Temp files are renamed into place, never left behind.
    let leftovers = std::fs::read_dir(&zips).expect("zip dir").count();
    assert_eq!(leftovers, 1);
    assert_eq!(std::fs::read_dir(pdfs.join(GRADE)).expect("pdf dir").count(), 2);
}

async fn download(app: &TestApp, admin: &Cookie<'static>, path: &str) -> TestResponse {
    app.server.get(path).add_cookie(admin.clone()).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_downloads_each_get_a_complete_archive() {
    let app = spawn_app();
    let ids = app
        .with_db(|conn| {
            let ids = seed(conn);
            let teacher = seed_teacher(conn, "Luis Docente", "luis@colegio.com");
            let science = seeded_subject(conn, "Ciencias", GRADE).id;
            school::create_assignment(conn, teacher, science, GRADE).expect("assign");
            for i in 0..18u8 {
                let name = format!("Alumno {i}");
                seed_student(conn, &name, GRADE);
                grade(conn, teacher, science, &name, 1, 60.0 + f64::from(i));
            }
            ids
        })
        .await;
    let admin = app.admin_session().await;

    let zip_path = "/admin/descargar_grado/Primero%20Primaria";
    for _ in 0..3 {
        let (a, b, c, d) = tokio::join!(
            download(&app, &admin, zip_path),
            download(&app, &admin, zip_path),
            download(&app, &admin, zip_path),
            download(&app, &admin, zip_path),
        );
        for resp in [a, b, c, d] {
            resp.assert_status_ok();
            assert_eq!(entry_names(resp.as_bytes()).len(), 20);
        }
    }

    let pdf_path = format!("/admin/reporte/{}", ids[0]);
    let (a, b) = tokio::join!(
        download(&app, &admin, &pdf_path),
        download(&app, &admin, &pdf_path),
    );
    for resp in [a, b] {
        resp.assert_status_ok();
        assert!(resp.as_bytes().starts_with(b"%PDF-"));
        assert!(resp.as_bytes().ends_with(b"%%EOF\n"));
    }
    assert_eq!(
        app.with_db(|conn| audit_count(conn, "DESCARGA_ZIP")).await,
        12
    );
}
