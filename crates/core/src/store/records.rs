//! Medical record rows.

use crate::{RecordError, RecordResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// The aggregate clinical document for one patient encounter.
///
/// `notes` mirrors the text of the current clinical note version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicalRecord {
    pub id: i64,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: i64,
    pub notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub prescriptions: Option<String>,
    pub lab_request: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a medical record when an appointment is completed.
#[derive(Clone, Debug, Default)]
pub struct NewMedicalRecord {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: i64,
    pub notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub prescriptions: Option<String>,
    pub lab_request: Option<String>,
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    Ok(MedicalRecord {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        notes: row.get(4)?,
        treatment_plan: row.get(5)?,
        prescriptions: row.get(6)?,
        lab_request: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Inserts a record. A second record for the same appointment is a [`RecordError::Conflict`].
pub fn insert_record(
    conn: &Connection,
    new: &NewMedicalRecord,
    now: DateTime<Utc>,
) -> RecordResult<MedicalRecord> {
    conn.query_row(
        "INSERT INTO medical_records
             (patient_id, doctor_id, appointment_id, notes, treatment_plan, prescriptions,
              lab_request, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
         RETURNING id, patient_id, doctor_id, appointment_id, notes, treatment_plan,
                   prescriptions, lab_request, created_at, updated_at",
        params![
            new.patient_id,
            new.doctor_id,
            new.appointment_id,
            new.notes,
            new.treatment_plan,
            new.prescriptions,
            new.lab_request,
            now,
        ],
        record_from_row,
    )
    .map_err(RecordError::from_write)
}

pub fn get_record(conn: &Connection, id: i64) -> RecordResult<Option<MedicalRecord>> {
    let record = conn
        .query_row(
            "SELECT id, patient_id, doctor_id, appointment_id, notes, treatment_plan,
                    prescriptions, lab_request, created_at, updated_at
             FROM medical_records WHERE id = ?1",
            params![id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Overwrites the denormalised notes field and returns the number of rows changed.
pub fn update_notes(
    conn: &Connection,
    id: i64,
    notes: &str,
    now: DateTime<Utc>,
) -> RecordResult<usize> {
    conn.execute(
        "UPDATE medical_records SET notes = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, notes, now],
    )
    .map_err(RecordError::from_write)
}

pub fn list_record_ids(conn: &Connection) -> RecordResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM medical_records ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}
