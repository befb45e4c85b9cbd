//! Account signup and login backed by the `users` table.

use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{DeskError, DeskResult};
use crate::state::Session;
use crate::store::HealthDb;

/// Lowercase hex SHA-256 of the password.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    hash_password(password) == hashed
}

pub fn signup(db: &HealthDb, username: &str, password: &str, confirm: &str) -> DeskResult<()> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(DeskError::validation("Please fill all fields."));
    }
    if password != confirm {
        return Err(DeskError::validation("Passwords do not match."));
    }

    let existing: Option<String> = db
        .conn()
        .query_row(
            "SELECT username FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(DeskError::UsernameTaken);
    }

    db.conn().execute(
        "INSERT INTO users (username, password) VALUES (?1, ?2)",
        params![username, hash_password(password)],
    )?;
    info!("Created account {}", username);
    Ok(())
}

pub fn login(db: &HealthDb, username: &str, password: &str) -> DeskResult<Session> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(DeskError::validation("Please fill both fields."));
    }

    let stored: Option<String> = db
        .conn()
        .query_row(
            "SELECT password FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        Some(hash) if verify_password(password, &hash) => {
            info!("User {} logged in", username);
            Ok(Session {
                username: username.to_string(),
            })
        }
        _ => {
            warn!("Failed login for {}", username);
            Err(DeskError::InvalidCredentials)
        }
    }
}
