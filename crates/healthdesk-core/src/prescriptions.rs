//! Saved AI suggestions for over-the-counter remedies (educational only).

use rusqlite::params;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{DeskError, DeskResult};
use crate::store::{now_timestamp, HealthDb};

const TITLE_CHARS: usize = 80;

pub fn suggestion_prompt(symptoms: &str) -> DeskResult<String> {
    let symptoms = symptoms.trim();
    if symptoms.is_empty() {
        return Err(DeskError::validation(
            "Please describe symptoms before generating suggestions.",
        ));
    }
    Ok(format!(
        "Suggest general over-the-counter medicines and home remedies for: {}. Keep it educational only, concise.",
        symptoms
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prescription {
    pub id: i64,
    pub symptoms: String,
    pub suggestion: String,
    pub created_at: String,
}

impl Prescription {
    /// List heading: timestamp plus the start of the symptoms.
    pub fn title(&self) -> String {
        let mut preview: String = self.symptoms.chars().take(TITLE_CHARS).collect();
        if self.symptoms.chars().count() > TITLE_CHARS {
            preview.push_str("...");
        }
        format!("{} — {}", self.created_at, preview)
    }

    pub fn to_text(&self, username: &str) -> String {
        format!(
            "Prescription for {}\nCreated at: {}\n\nSymptoms:\n{}\n\nSuggestion (Educational Only):\n{}\n\n\
             ⚠ This is educational content only. Not a medical prescription.",
            username, self.created_at, self.symptoms, self.suggestion
        )
    }

    pub fn file_name(&self) -> String {
        format!("prescription_{}.txt", self.id)
    }
}

pub fn save(db: &HealthDb, username: &str, symptoms: &str, suggestion: &str) -> DeskResult<i64> {
    db.conn().execute(
        "INSERT INTO prescriptions (username, symptoms, suggestion, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, symptoms.trim(), suggestion, now_timestamp()],
    )?;
    let id = db.conn().last_insert_rowid();
    info!("Saved prescription {} for {}", id, username);
    Ok(id)
}

pub fn list(db: &HealthDb, username: &str) -> DeskResult<Vec<Prescription>> {
    let mut stmt = db.conn().prepare(
        "SELECT id, symptoms, suggestion, created_at FROM prescriptions
         WHERE username = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([username], |row| {
            Ok(Prescription {
                id: row.get(0)?,
                symptoms: row.get(1)?,
                suggestion: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete one of the user's prescriptions.
pub fn delete(db: &HealthDb, username: &str, id: i64) -> DeskResult<()> {
    let removed = db.conn().execute(
        "DELETE FROM prescriptions WHERE id = ?1 AND username = ?2",
        params![id, username],
    )?;
    if removed == 0 {
        return Err(DeskError::NotFound(format!("No prescription #{}", id)));
    }
    info!("Deleted prescription {} for {}", id, username);
    Ok(())
}

/// Write the download document into `dir` and return its path.
pub fn export(dir: &Path, username: &str, prescription: &Prescription) -> DeskResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(prescription.file_name());
    std::fs::write(&path, prescription.to_text(username))?;
    Ok(path)
}
