//! SQLite storage for accounts, appointments, reports and saved prescriptions.

use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use crate::error::DeskResult;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT,
    patient_name TEXT,
    age INTEGER,
    gender TEXT,
    phone TEXT,
    email TEXT,
    department TEXT,
    doctor TEXT,
    date TEXT,
    time TEXT,
    type TEXT,
    symptoms TEXT,
    emergency INTEGER,
    followup INTEGER,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS medical_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT,
    name TEXT,
    file_name TEXT,
    type TEXT,
    date TEXT,
    notes TEXT,
    uploaded_at TEXT
);

CREATE TABLE IF NOT EXISTS prescriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT,
    symptoms TEXT,
    suggestion TEXT,
    created_at TEXT
);
";

/// Format used for every `created_at` / `uploaded_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub struct HealthDb {
    conn: Connection,
}

impl HealthDb {
    pub fn open(path: &Path) -> DeskResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened database at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> DeskResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DeskResult<Self> {
        conn.execute_batch(SCHEMA)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Older databases predate the appointment status column.
    fn migrate(&self) -> DeskResult<()> {
        if !self.has_column("appointments", "status")? {
            self.conn.execute(
                "ALTER TABLE appointments ADD COLUMN status TEXT DEFAULT 'Confirmed'",
                [],
            )?;
            info!("Added status column to appointments");
        }
        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> DeskResult<bool> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.iter().any(|n| n == column))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_created() {
        let db = HealthDb::open_in_memory().unwrap();
        for table in ["users", "appointments", "medical_reports", "prescriptions"] {
            let count: i64 = db
                .conn()
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
        assert!(db.has_column("appointments", "status").unwrap());
    }

    #[test]
    fn test_reopen_keeps_data_and_migrates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("app_data.db");
        {
            let db = HealthDb::open(&path).unwrap();
            db.conn()
                .execute("INSERT INTO users (username, password) VALUES ('ana', 'x')", [])
                .unwrap();
        }
        let db = HealthDb::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_legacy_appointments_table_gains_status() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE appointments (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT, created_at TEXT);
             INSERT INTO appointments (username, created_at) VALUES ('ana', '2024-01-01 10:00');",
        )
        .unwrap();
        let db = HealthDb::init(conn).unwrap();
        let status: String = db
            .conn()
            .query_row("SELECT COALESCE(status, 'Confirmed') FROM appointments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "Confirmed");
    }
}
