use anyhow::Context;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::grades::GradeRecord;
use crate::report::{self, ReportSettings};
use crate::school::Student;

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub archive_path: PathBuf,
    /// The archive exactly as written to `archive_path`.
    pub bytes: Vec<u8>,
    pub entry_count: usize,
    pub skipped: usize,
}

/// Picks the entry name for a student's report card. Two students whose
/// names normalize to the same file name (`Ana María` and `Ana_María`) get
/// distinct entries; the later one is suffixed with its id.
fn entry_name(student: &Student, school_year: i32, used: &mut HashSet<String>) -> String {
    let name = report::artifact_file_name(&student.name, school_year);
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.trim_end_matches(".pdf");
    let disambiguated = format!("{stem}_{}.pdf", student.id);
    tracing::warn!(
        student_id = student.id,
        entry = %name,
        renamed = %disambiguated,
        "report file name collision"
    );
    used.insert(disambiguated.clone());
    disambiguated
}

/// Regenerates the report card of every graded student in `students` and
/// zips them into `<zip_root>/<grade_level>.zip`.
///
/// Students without any grade are skipped, so an all-ungraded grade-level
/// still yields a (valid, empty) archive. The archive is assembled in memory
/// and replaces the previous one in a single rename.
pub fn export_grade_level(
    pdf_root: &Path,
    zip_root: &Path,
    settings: &ReportSettings,
    grade_level: &str,
    students: &[(Student, Vec<GradeRecord>)],
) -> anyhow::Result<ExportSummary> {
    let archive_path = zip_root.join(format!("{}.zip", report::path_component(grade_level)));
    let pdf_dir = pdf_root.join(report::path_component(grade_level));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    let mut entry_count = 0;
    let mut skipped = 0;
    for (student, grades) in students {
        if grades.is_empty() {
            skipped += 1;
            continue;
        }
        let name = entry_name(student, settings.school_year, &mut used);
        let written =
            report::write_report_card_to(pdf_dir.join(&name), settings, student, grades)?;

        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(&written.bytes)
            .with_context(|| format!("failed to write entry {name}"))?;
        entry_count += 1;
    }

    let bytes = zip
        .finish()
        .context("failed to finalize zip archive")?
        .into_inner();
    report::write_artifact(&archive_path, &bytes)?;

    tracing::info!(
        grade_level,
        entries = entry_count,
        skipped,
        archive = %archive_path.display(),
        "grade-level reports exported"
    );

    Ok(ExportSummary {
        archive_path,
        bytes,
        entry_count,
        skipped,
    })
}
