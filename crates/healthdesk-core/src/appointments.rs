//! Doctor appointment booking.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::params;
use tracing::info;

use crate::error::{DeskError, DeskResult};
use crate::store::{now_timestamp, HealthDb};

pub const DEFAULT_STATUS: &str = "Confirmed";
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn all() -> Vec<Gender> {
        vec![Gender::Male, Gender::Female, Gender::Other, Gender::PreferNotToSay]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::PreferNotToSay => "Prefer not to say",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Department {
    GeneralPhysician,
    Cardiologist,
    Dermatologist,
    Dentist,
    Psychiatrist,
    Orthopedic,
    Pediatrician,
    Gynecologist,
    Ent,
}

impl Department {
    pub fn all() -> Vec<Department> {
        vec![
            Department::GeneralPhysician,
            Department::Cardiologist,
            Department::Dermatologist,
            Department::Dentist,
            Department::Psychiatrist,
            Department::Orthopedic,
            Department::Pediatrician,
            Department::Gynecologist,
            Department::Ent,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::GeneralPhysician => "General Physician",
            Department::Cardiologist => "Cardiologist",
            Department::Dermatologist => "Dermatologist",
            Department::Dentist => "Dentist",
            Department::Psychiatrist => "Psychiatrist",
            Department::Orthopedic => "Orthopedic",
            Department::Pediatrician => "Pediatrician",
            Department::Gynecologist => "Gynecologist",
            Department::Ent => "ENT Specialist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationType {
    InPerson,
    VideoCall,
    PhoneCall,
}

impl ConsultationType {
    pub fn all() -> Vec<ConsultationType> {
        vec![
            ConsultationType::InPerson,
            ConsultationType::VideoCall,
            ConsultationType::PhoneCall,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::InPerson => "In-Person",
            ConsultationType::VideoCall => "Video Call",
            ConsultationType::PhoneCall => "Phone Call",
        }
    }
}

/// Doctors offered in the booking form.
pub fn doctors() -> Vec<&'static str> {
    vec!["Dr. Anil Sharma", "Dr. Meera Sharma", "Dr. Rohan Sharma"]
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_name: String,
    pub age: u32,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub department: Department,
    pub doctor: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub consultation_type: ConsultationType,
    pub symptoms: String,
    pub emergency: bool,
    pub followup: bool,
}

impl NewAppointment {
    pub fn validate(&self) -> DeskResult<()> {
        if self.patient_name.trim().is_empty() {
            return Err(DeskError::validation("Patient name is required."));
        }
        if !(1..=120).contains(&self.age) {
            return Err(DeskError::validation("Age must be between 1 and 120."));
        }
        if self.doctor.trim().is_empty() {
            return Err(DeskError::validation("Select a doctor."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentSummary {
    pub id: i64,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub status: String,
}

pub fn book(db: &HealthDb, username: &str, appt: &NewAppointment) -> DeskResult<i64> {
    appt.validate()?;

    db.conn().execute(
        "INSERT INTO appointments (username, patient_name, age, gender, phone, email, department, doctor,
                                   date, time, type, symptoms, emergency, followup, created_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            username,
            appt.patient_name.trim(),
            appt.age,
            appt.gender.as_str(),
            appt.phone.trim(),
            appt.email.trim(),
            appt.department.as_str(),
            appt.doctor,
            appt.date.format("%Y-%m-%d").to_string(),
            appt.time.format("%H:%M").to_string(),
            appt.consultation_type.as_str(),
            appt.symptoms.trim(),
            appt.emergency as i32,
            appt.followup as i32,
            now_timestamp(),
            DEFAULT_STATUS,
        ],
    )?;
    let id = db.conn().last_insert_rowid();
    info!(
        "Booked appointment {} for {} with {} on {}",
        id, username, appt.doctor, appt.date
    );
    Ok(id)
}

pub fn list_recent(db: &HealthDb, username: &str, limit: usize) -> DeskResult<Vec<AppointmentSummary>> {
    let mut stmt = db.conn().prepare(
        "SELECT id, doctor, date, time, COALESCE(NULLIF(status, ''), ?3)
         FROM appointments WHERE username = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![username, limit as i64, DEFAULT_STATUS], |row| {
            Ok(AppointmentSummary {
                id: row.get(0)?,
                doctor: row.get(1)?,
                date: row.get(2)?,
                time: row.get(3)?,
                status: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(date: &str) -> NewAppointment {
        NewAppointment {
            patient_name: "Ana".to_string(),
            age: 25,
            gender: Gender::Female,
            phone: "+91 90000 00000".to_string(),
            email: "ana@example.com".to_string(),
            department: Department::Dermatologist,
            doctor: doctors()[0].to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            consultation_type: ConsultationType::VideoCall,
            symptoms: "rash".to_string(),
            emergency: true,
            followup: false,
        }
    }

    #[test]
    fn test_book_and_list() {
        let db = HealthDb::open_in_memory().unwrap();
        let first = book(&db, "ana", &sample("2024-05-01")).unwrap();
        let second = book(&db, "ana", &sample("2024-06-01")).unwrap();
        book(&db, "bob", &sample("2024-06-02")).unwrap();

        let list = list_recent(&db, "ana", RECENT_LIMIT).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
        assert_eq!(list[0].time, "09:30");
        assert_eq!(list[0].status, "Confirmed");

        let (emergency, kind): (i64, String) = db
            .conn()
            .query_row("SELECT emergency, type FROM appointments WHERE id = ?1", [first], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(emergency, 1);
        assert_eq!(kind, "Video Call");
    }

    #[test]
    fn test_limit_and_null_status() {
        let db = HealthDb::open_in_memory().unwrap();
        for day in 1..=12 {
            book(&db, "ana", &sample(&format!("2024-01-{:02}", day))).unwrap();
        }
        db.conn().execute("UPDATE appointments SET status = NULL", []).unwrap();
        let list = list_recent(&db, "ana", RECENT_LIMIT).unwrap();
        assert_eq!(list.len(), 10);
        assert!(list.iter().all(|a| a.status == "Confirmed"));
    }

    #[test]
    fn test_validation() {
        let mut appt = sample("2024-01-01");
        appt.age = 0;
        assert!(appt.validate().is_err());
        appt.age = 121;
        assert!(appt.validate().is_err());
        appt.age = 120;
        appt.patient_name = " ".to_string();
        assert_eq!(appt.validate().unwrap_err().to_string(), "Patient name is required.");
    }
}
