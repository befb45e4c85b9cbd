//! Medical report uploads: file bytes under `uploads/`, metadata in `medical_reports`.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{DeskError, DeskResult};
use crate::store::{now_timestamp, HealthDb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    BloodTest,
    XRay,
    Mri,
    CtScan,
    Ultrasound,
    Prescription,
    Other,
}

impl ReportType {
    pub fn all() -> Vec<ReportType> {
        vec![
            ReportType::BloodTest,
            ReportType::XRay,
            ReportType::Mri,
            ReportType::CtScan,
            ReportType::Ultrasound,
            ReportType::Prescription,
            ReportType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::BloodTest => "Blood Test",
            ReportType::XRay => "X-Ray",
            ReportType::Mri => "MRI",
            ReportType::CtScan => "CT Scan",
            ReportType::Ultrasound => "Ultrasound",
            ReportType::Prescription => "Prescription",
            ReportType::Other => "Other",
        }
    }
}

const ACCEPTED_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub source: &'a Path,
    pub name: &'a str,
    pub report_type: ReportType,
    pub date: NaiveDate,
    pub notes: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub file_name: String,
    pub report_type: String,
    pub date: String,
    pub notes: String,
    pub uploaded_at: String,
}

pub fn save_report(
    db: &HealthDb,
    uploads_dir: &Path,
    username: &str,
    report: &NewReport<'_>,
) -> DeskResult<i64> {
    if !report.source.is_file() {
        return Err(DeskError::validation("Pick a file first."));
    }
    let original_name = report
        .source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| DeskError::validation("Pick a file first."))?;
    let accepted = report
        .source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);
    if !accepted {
        return Err(DeskError::validation("Reports must be PDF, JPG or PNG files."));
    }

    std::fs::create_dir_all(uploads_dir)?;
    let stored_name = format!("{}_{}", chrono::Local::now().timestamp(), original_name);
    std::fs::copy(report.source, uploads_dir.join(&stored_name))?;

    let name = match report.name.trim() {
        "" => original_name.as_str(),
        given => given,
    };

    db.conn().execute(
        "INSERT INTO medical_reports (username, name, file_name, type, date, notes, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            username,
            name,
            stored_name,
            report.report_type.as_str(),
            report.date.format("%Y-%m-%d").to_string(),
            report.notes.trim(),
            now_timestamp(),
        ],
    )?;
    let id = db.conn().last_insert_rowid();
    info!("Saved report {} for {} as {}", id, username, stored_name);
    Ok(id)
}

pub fn list_reports(db: &HealthDb, username: &str) -> DeskResult<Vec<Report>> {
    let mut stmt = db.conn().prepare(
        "SELECT id, name, file_name, type, date, COALESCE(notes, ''), uploaded_at
         FROM medical_reports WHERE username = ?1
         ORDER BY uploaded_at DESC, id DESC",
    )?;
    let reports = stmt
        .query_map([username], |row| {
            Ok(Report {
                id: row.get(0)?,
                name: row.get(1)?,
                file_name: row.get(2)?,
                report_type: row.get(3)?,
                date: row.get(4)?,
                notes: row.get(5)?,
                uploaded_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(reports)
}

/// Copy a stored report out to `dest_dir`, returning the written path.
pub fn export_report(
    db: &HealthDb,
    uploads_dir: &Path,
    username: &str,
    id: i64,
    dest_dir: &Path,
) -> DeskResult<PathBuf> {
    let file_name: Option<String> = db
        .conn()
        .query_row(
            "SELECT file_name FROM medical_reports WHERE id = ?1 AND username = ?2",
            params![id, username],
            |row| row.get(0),
        )
        .optional()?;
    let file_name = file_name.ok_or_else(|| DeskError::NotFound(format!("No report #{}", id)))?;

    let stored = uploads_dir.join(&file_name);
    if !stored.is_file() {
        return Err(DeskError::NotFound("File not found on server.".to_string()));
    }

    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(&file_name);
    std::fs::copy(&stored, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_save_and_list() {
        let db = HealthDb::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cbc.pdf");
        std::fs::write(&source, b"%PDF-1.4").unwrap();
        let uploads = dir.path().join("uploads");

        let id = save_report(
            &db,
            &uploads,
            "ana",
            &NewReport {
                source: &source,
                name: "  ",
                report_type: ReportType::BloodTest,
                date: date(),
                notes: "fasting",
            },
        )
        .unwrap();

        let reports = list_reports(&db, "ana").unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.id, id);
        assert_eq!(report.name, "cbc.pdf");
        assert_eq!(report.report_type, "Blood Test");
        assert_eq!(report.date, "2024-03-09");
        assert!(report.file_name.ends_with("_cbc.pdf"));
        assert!(uploads.join(&report.file_name).is_file());

        assert!(list_reports(&db, "someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_missing_and_unsupported_files() {
        let db = HealthDb::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.pdf");
        let err = save_report(
            &db,
            dir.path(),
            "ana",
            &NewReport {
                source: &missing,
                name: "",
                report_type: ReportType::Other,
                date: date(),
                notes: "",
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Pick a file first.");

        let doc = dir.path().join("notes.docx");
        std::fs::write(&doc, b"x").unwrap();
        assert!(save_report(
            &db,
            dir.path(),
            "ana",
            &NewReport {
                source: &doc,
                name: "",
                report_type: ReportType::Other,
                date: date(),
                notes: "",
            },
        )
        .is_err());
    }

    #[test]
    fn test_export_scoped_and_missing_file() {
        let db = HealthDb::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.png");
        std::fs::write(&source, b"png").unwrap();
        let uploads = dir.path().join("uploads");
        let exports = dir.path().join("exports");
        let id = save_report(
            &db,
            &uploads,
            "ana",
            &NewReport {
                source: &source,
                name: "Knee",
                report_type: ReportType::XRay,
                date: date(),
                notes: "",
            },
        )
        .unwrap();

        assert!(matches!(
            export_report(&db, &uploads, "bob", id, &exports),
            Err(DeskError::NotFound(_))
        ));

        let out = export_report(&db, &uploads, "ana", id, &exports).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"png");

        let stored = list_reports(&db, "ana").unwrap().remove(0).file_name;
        std::fs::remove_file(uploads.join(stored)).unwrap();
        let err = export_report(&db, &uploads, "ana", id, &exports).unwrap_err();
        assert_eq!(err.to_string(), "File not found on server.");
    }
}
