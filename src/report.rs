use anyhow::Context;
use chrono::Local;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::grades::GradeRecord;
use crate::pdf::{Document, Font, JpegImage, Page, CM, LETTER};
use crate::school::Student;

pub const DEFAULT_SCHOOL_NAME: &str = "LICEO PREUNIVERSITARIO SANTINY";
pub const DEFAULT_SCHOOL_YEAR: i32 = 2026;
pub const REPORT_TITLE: &str = "BOLETA OFICIAL DE CALIFICACIONES";

const TABLE_HEADER: [&str; 6] = [
    "Materia",
    "Bloque 1",
    "Bloque 2",
    "Bloque 3",
    "Bloque 4",
    "Promedio Final",
];
const COLUMN_WIDTHS_CM: [f32; 6] = [5.0, 2.0, 2.0, 2.0, 2.0, 3.0];
const ROW_HEIGHT: f32 = 18.0;
const CELL_FONT_SIZE: f32 = 10.0;
const HEADER_GRAY: f32 = 0.827;
const FOOTER_HEIGHT: f32 = 90.0;

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub school_name: String,
    pub school_year: i32,
    /// Optional JPEG drawn above the header; skipped when the file is missing.
    pub logo: Option<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            school_name: DEFAULT_SCHOOL_NAME.to_string(),
            school_year: DEFAULT_SCHOOL_YEAR,
            logo: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRow {
    pub subject: String,
    /// Scores for blocks 1..=4; `None` when no grade was recorded.
    pub blocks: [Option<f64>; 4],
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub student_name: String,
    pub grade_level: String,
    pub school_year: i32,
    pub rows: Vec<SubjectRow>,
}

impl ReportCard {
    pub fn build(student: &Student, grades: &[GradeRecord], school_year: i32) -> Self {
        Self {
            student_name: student.name.clone(),
            grade_level: student.grade_level.clone(),
            school_year,
            rows: subject_rows(grades),
        }
    }
}

/// Groups grades by subject, in order of first appearance.
pub fn subject_rows(grades: &[GradeRecord]) -> Vec<SubjectRow> {
    let mut rows: Vec<SubjectRow> = Vec::new();
    for g in grades {
        let idx = match rows.iter().position(|r| r.subject == g.subject) {
            Some(i) => i,
            None => {
                rows.push(SubjectRow {
                    subject: g.subject.clone(),
                    blocks: [None; 4],
                    average: 0.0,
                });
                rows.len() - 1
            }
        };
        if let Some(slot) = (g.block as usize)
            .checked_sub(1)
            .and_then(|i| rows[idx].blocks.get_mut(i))
        {
            *slot = Some(g.score);
        }
    }
    for row in &mut rows {
        row.average = block_average(&row.blocks);
    }
    rows
}

/// Always divides by four: a block with no grade counts as a zero.
pub fn block_average(blocks: &[Option<f64>; 4]) -> f64 {
    let sum: f64 = blocks.iter().map(|b| b.unwrap_or(0.0)).sum();
    round2(sum / 4.0)
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Two decimals at most, trailing zeros dropped: 85 -> "85", 67.5 -> "67.5".
pub fn format_score(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Ten upper-case characters printed on the footer. Not stored anywhere.
pub fn verification_code() -> String {
    Uuid::new_v4().to_string()[..10].to_ascii_uppercase()
}

/// Makes a label safe to use as a single path component.
pub fn path_component(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

pub fn artifact_file_name(student_name: &str, school_year: i32) -> String {
    format!(
        "{}_{}.pdf",
        path_component(&student_name.replace(' ', "_")),
        school_year
    )
}

/// `<pdf_root>/<grade-level>/<Student_Name>_<year>.pdf`
pub fn artifact_path(pdf_root: &Path, student: &Student, school_year: i32) -> PathBuf {
    pdf_root
        .join(path_component(&student.grade_level))
        .join(artifact_file_name(&student.name, school_year))
}

fn fit_text(font: Font, size: f32, text: &str, max_width: f32) -> String {
    if font.text_width(text, size) <= max_width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while !out.is_empty() && font.text_width(&format!("{out}..."), size) > max_width {
        out.pop();
    }
    format!("{out}...")
}

struct Layout {
    width: f32,
    height: f32,
    margin: f32,
    table_x: f32,
    columns: [f32; 6],
}

impl Layout {
    fn letter() -> Self {
        let (width, height) = LETTER;
        let columns = COLUMN_WIDTHS_CM.map(|w| w * CM);
        let table_width: f32 = columns.iter().sum();
        Self {
            width,
            height,
            margin: 2.0 * CM,
            table_x: (width - table_width) / 2.0,
            columns,
        }
    }

    fn center(&self) -> f32 {
        self.width / 2.0
    }

    fn top(&self) -> f32 {
        self.height - self.margin
    }

    /// Draws one table row whose top edge is at `top`.
    fn row(&self, page: &mut Page, top: f32, cells: &[String; 6], header: bool) {
        let bottom = top - ROW_HEIGHT;
        let font = if header { Font::Bold } else { Font::Regular };
        let mut x = self.table_x;
        for (i, (cell, w)) in cells.iter().zip(self.columns).enumerate() {
            if header {
                page.fill_rect(x, bottom, w, ROW_HEIGHT, HEADER_GRAY);
            }
            page.stroke_rect(x, bottom, w, ROW_HEIGHT, 1.0);
            let text = fit_text(font, CELL_FONT_SIZE, cell, w - 8.0);
            let baseline = bottom + 6.0;
            if i == 0 {
                page.text(font, CELL_FONT_SIZE, x + 4.0, baseline, &text);
            } else {
                page.text_centered(font, CELL_FONT_SIZE, x + w / 2.0, baseline, &text);
            }
            x += w;
        }
    }
}

fn labelled_line(page: &mut Page, x: f32, y: f32, label: &str, value: &str) {
    page.text(Font::Bold, 11.0, x, y, label);
    let offset = Font::Bold.text_width(label, 11.0) + 4.0;
    page.text(Font::Regular, 11.0, x + offset, y, value);
}

/// Lays out the report card. `generated_at` and `code` go in the footer.
pub fn render_pdf(
    card: &ReportCard,
    settings: &ReportSettings,
    logo: Option<JpegImage>,
    generated_at: &str,
    code: &str,
) -> Vec<u8> {
    let layout = Layout::letter();
    let mut doc = Document::new(LETTER);
    let mut page = Page::new();
    let mut y = layout.top();

    if let Some(img) = logo {
        let side = 4.0 * CM;
        page.image(layout.center() - side / 2.0, y - side, side, side);
        doc.set_image(img);
        y -= side + 14.0;
    }

    page.text_centered(Font::Bold, 16.0, layout.center(), y - 16.0, &settings.school_name);
    y -= 24.0;
    page.text_centered(Font::Bold, 13.0, layout.center(), y - 13.0, REPORT_TITLE);
    y -= 40.0;

    let year = card.school_year.to_string();
    for (label, value) in [
        ("Alumno:", card.student_name.as_str()),
        ("Grado:", card.grade_level.as_str()),
        ("Ciclo Escolar:", year.as_str()),
    ] {
        labelled_line(&mut page, layout.margin, y, label, value);
        y -= 16.0;
    }
    y -= 14.0;

    let header = TABLE_HEADER.map(str::to_string);
    layout.row(&mut page, y, &header, true);
    y -= ROW_HEIGHT;

    for row in &card.rows {
        if y - ROW_HEIGHT < layout.margin {
            doc.add_page(std::mem::take(&mut page));
            y = layout.top();
            layout.row(&mut page, y, &header, true);
            y -= ROW_HEIGHT;
        }
        let [b1, b2, b3, b4] = row.blocks.map(|b| b.map(format_score).unwrap_or_default());
        let cells = [
            row.subject.clone(),
            b1,
            b2,
            b3,
            b4,
            format_score(row.average),
        ];
        layout.row(&mut page, y, &cells, false);
        y -= ROW_HEIGHT;
    }

    if y - FOOTER_HEIGHT < layout.margin {
        doc.add_page(std::mem::take(&mut page));
        y = layout.top();
    }
    y -= 30.0;
    page.text(Font::Bold, 11.0, layout.margin, y, "VALIDACIÓN DIGITAL");
    y -= 15.0;
    page.text(
        Font::Regular,
        10.0,
        layout.margin,
        y,
        &format!("Documento generado automáticamente el {generated_at}."),
    );
    y -= 14.0;
    let label = "Código único de verificación: ";
    page.text(Font::Regular, 10.0, layout.margin, y, label);
    let offset = Font::Regular.text_width(label, 10.0);
    page.text(Font::Bold, 10.0, layout.margin + offset, y, code);
    y -= 14.0;
    page.text(
        Font::Regular,
        10.0,
        layout.margin,
        y,
        "Este documento es oficial y válido sin firma manuscrita.",
    );

    doc.add_page(page);
    doc.to_bytes()
}

fn load_logo(settings: &ReportSettings) -> Option<JpegImage> {
    let path = settings.logo.as_deref().filter(|p| p.is_file())?;
    match std::fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(JpegImage::from_bytes)
    {
        Ok(img) => Some(img),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "report logo skipped");
            None
        }
    }
}

/// A report card as written to disk, with the bytes that were written.
#[derive(Debug, Clone)]
pub struct WrittenReport {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Renders one student's report card without touching the filesystem.
pub fn render_report_card(
    settings: &ReportSettings,
    student: &Student,
    grades: &[GradeRecord],
) -> Vec<u8> {
    let card = ReportCard::build(student, grades, settings.school_year);
    let generated_at = Local::now().format("%d/%m/%Y %H:%M").to_string();
    render_pdf(
        &card,
        settings,
        load_logo(settings),
        &generated_at,
        &verification_code(),
    )
}

/// Replaces `path` with `bytes` through a uniquely named sibling temp file,
/// so readers never observe a partially written artifact.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to replace {}", path.to_string_lossy()));
    }
    Ok(())
}

/// Renders and writes one student's report card to its standard location.
/// An existing artifact for the same student is overwritten.
pub fn write_report_card(
    pdf_root: &Path,
    settings: &ReportSettings,
    student: &Student,
    grades: &[GradeRecord],
) -> anyhow::Result<WrittenReport> {
    let path = artifact_path(pdf_root, student, settings.school_year);
    write_report_card_to(path, settings, student, grades)
}

/// Like [`write_report_card`] but to an explicit path.
pub fn write_report_card_to(
    path: PathBuf,
    settings: &ReportSettings,
    student: &Student,
    grades: &[GradeRecord],
) -> anyhow::Result<WrittenReport> {
    let bytes = render_report_card(settings, student, grades);
    write_artifact(&path, &bytes)
        .with_context(|| format!("failed to write report for student {}", student.id))?;
    tracing::debug!(student_id = student.id, path = %path.display(), "report card written");
    Ok(WrittenReport { path, bytes })
}
