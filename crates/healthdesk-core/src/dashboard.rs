//! Per-user activity summaries for the health dashboard.

use rusqlite::params;

use crate::error::DeskResult;
use crate::store::HealthDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub appointments: u32,
    pub reports: u32,
    pub prescriptions: u32,
}

impl DashboardStats {
    pub fn load(db: &HealthDb, username: &str) -> DeskResult<Self> {
        Ok(Self {
            appointments: count(db, "appointments", username)?,
            reports: count(db, "medical_reports", username)?,
            prescriptions: count(db, "prescriptions", username)?,
        })
    }
}

fn count(db: &HealthDb, table: &str, username: &str) -> DeskResult<u32> {
    let n: i64 = db.conn().query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE username = ?1", table),
        [username],
        |row| row.get(0),
    )?;
    Ok(n as u32)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub date: String,
    pub doctor: String,
    pub consultation_type: String,
}

pub fn recent_activity(db: &HealthDb, username: &str, limit: usize) -> DeskResult<Vec<Activity>> {
    let mut stmt = db.conn().prepare(
        "SELECT date, doctor, type FROM appointments WHERE username = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![username, limit as i64], |row| {
            Ok(Activity {
                date: row.get(0)?,
                doctor: row.get(1)?,
                consultation_type: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `(YYYY-MM, count)` pairs in ascending month order.
pub fn appointments_per_month(db: &HealthDb, username: &str) -> DeskResult<Vec<(String, u32)>> {
    let mut stmt = db.conn().prepare(
        "SELECT substr(date, 1, 7) AS ym, COUNT(*) FROM appointments
         WHERE username = ?1 GROUP BY ym ORDER BY ym ASC",
    )?;
    let rows = stmt
        .query_map([username], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub label: String,
    pub count: u32,
    pub percent: f64,
}

pub fn report_distribution(db: &HealthDb, username: &str) -> DeskResult<Vec<Share>> {
    let mut stmt = db.conn().prepare(
        "SELECT type, COUNT(*) FROM medical_reports WHERE username = ?1
         GROUP BY type ORDER BY COUNT(*) DESC, type ASC",
    )?;
    let counts = stmt
        .query_map([username], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32)))?
        .collect::<Result<Vec<_>, _>>()?;

    let total: u32 = counts.iter().map(|(_, c)| c).sum();
    Ok(counts
        .into_iter()
        .map(|(label, count)| Share {
            label,
            count,
            percent: if total == 0 { 0.0 } else { count as f64 * 100.0 / total as f64 },
        })
        .collect())
}

pub fn daily_tip_prompt() -> &'static str {
    "Give a short, motivating daily health tip for general wellness (one or two sentences)."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{book, tests::sample};
    use crate::{prescriptions, store::now_timestamp};

    fn add_report(db: &HealthDb, user: &str, kind: &str) {
        db.conn()
            .execute(
                "INSERT INTO medical_reports (username, name, file_name, type, date, notes, uploaded_at)
                 VALUES (?1, 'r', 'f', ?2, '2024-01-01', '', ?3)",
                params![user, kind, now_timestamp()],
            )
            .unwrap();
    }

    #[test]
    fn test_counts_scoped_to_user() {
        let db = HealthDb::open_in_memory().unwrap();
        book(&db, "ana", &sample("2024-01-05")).unwrap();
        book(&db, "bob", &sample("2024-01-05")).unwrap();
        add_report(&db, "ana", "MRI");
        prescriptions::save(&db, "ana", "cough", "honey").unwrap();
        prescriptions::save(&db, "ana", "fever", "rest").unwrap();

        let stats = DashboardStats::load(&db, "ana").unwrap();
        assert_eq!(stats, DashboardStats { appointments: 1, reports: 1, prescriptions: 2 });
        assert_eq!(DashboardStats::load(&db, "nobody").unwrap(), DashboardStats::default());
    }

    #[test]
    fn test_per_month_ascending() {
        let db = HealthDb::open_in_memory().unwrap();
        for date in ["2024-03-02", "2024-01-10", "2024-03-20", "2023-12-31"] {
            book(&db, "ana", &sample(date)).unwrap();
        }
        let months = appointments_per_month(&db, "ana").unwrap();
        assert_eq!(
            months,
            vec![
                ("2023-12".to_string(), 1),
                ("2024-01".to_string(), 1),
                ("2024-03".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_recent_activity_limit() {
        let db = HealthDb::open_in_memory().unwrap();
        for day in 1..=7 {
            book(&db, "ana", &sample(&format!("2024-02-{:02}", day))).unwrap();
        }
        let recent = recent_activity(&db, "ana", 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].date, "2024-02-07");
        assert_eq!(recent[0].consultation_type, "Video Call");
    }

    #[test]
    fn test_distribution_sums_to_hundred() {
        let db = HealthDb::open_in_memory().unwrap();
        for kind in ["MRI", "X-Ray", "MRI"] {
            add_report(&db, "ana", kind);
        }
        let shares = report_distribution(&db, "ana").unwrap();
        assert_eq!(shares[0].label, "MRI");
        assert_eq!(shares[0].count, 2);
        let sum: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!(report_distribution(&db, "bob").unwrap().is_empty());
    }
}
