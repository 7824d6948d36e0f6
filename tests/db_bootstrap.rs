mod test_support;

use gradebookd::accounts::{self, Role};
use gradebookd::db;
use test_support::*;

#[test]
fn bootstrap_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = db::open_db(dir.path()).expect("open db");

    let first = db::bootstrap(&conn, ADMIN_EMAIL, ADMIN_PASSWORD).expect("first bootstrap");
    assert!(first.admin_created);
    assert_eq!(first.subjects_seeded, db::DEFAULT_SUBJECTS.len());

    let second = db::bootstrap(&conn, ADMIN_EMAIL, "a-different-password").expect("second");
    assert!(!second.admin_created);
    assert_eq!(second.subjects_seeded, 0);

    // The existing admin keeps its password.
    let admin = accounts::authenticate(&conn, ADMIN_EMAIL, ADMIN_PASSWORD)
        .expect("authenticate")
        .expect("admin");
    assert_eq!(admin.role, Role::Admin);
    assert!(dir.path().join(db::DB_FILE).is_file());
}

#[test]
fn default_subjects_are_seeded_per_grade_level() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());

    let subjects = gradebookd::school::list_subjects(&conn).expect("subjects");
    let pairs: Vec<(&str, &str)> = subjects
        .iter()
        .map(|s| (s.grade_level.as_str(), s.name.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("Primero Primaria", "Ciencias"),
            ("Primero Primaria", "Lenguaje"),
            ("Primero Primaria", "Matemática"),
            ("Segundo Primaria", "Lenguaje"),
            ("Segundo Primaria", "Matemática"),
            ("Segundo Primaria", "Sociales"),
        ]
    );
}

#[test]
fn schema_rejects_out_of_range_blocks_and_duplicate_slots() {
    let dir = tempfile::tempdir().expect("temp dir");
    let conn = open_bootstrapped(dir.path());
    let student = seed_student(&conn, "María López", "Primero Primaria");

    let insert = |block: i64| {
        conn.execute(
            "INSERT INTO grades(student_id, subject, block, score) VALUES(?, 'Matemática', ?, 90)",
            (student.id, block),
        )
    };
    assert!(insert(5).is_err());
    assert!(insert(1).is_ok());
    assert!(insert(1).is_err());

    // Foreign keys are enforced.
    let orphan = conn.execute(
        "INSERT INTO grades(student_id, subject, block, score) VALUES(999, 'Matemática', 1, 90)",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn reopening_keeps_existing_data() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let conn = open_bootstrapped(dir.path());
        seed_student(&conn, "María López", "Primero Primaria");
    }
    let conn = open_bootstrapped(dir.path());
    let students = gradebookd::school::list_students(&conn).expect("students");
    assert_eq!(students.len(), 1);
    assert_eq!(
        accounts::list_by_role(&conn, Role::Admin).expect("admins").len(),
        1
    );
}
