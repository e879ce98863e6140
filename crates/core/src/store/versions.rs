//! Clinical note version repository.
//!
//! Versions are append-only. The only mutation this module performs on an existing row is
//! clearing `is_current`; the schema triggers reject anything else.
//!
//! Reads and writes treat an unprovisioned version table differently: reads degrade to an empty
//! result, while writes fail with [`RecordError::StorageUnavailable`] because a note cannot be
//! silently dropped.

use super::schema::provisioning_state;
use crate::{RecordError, RecordResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// One immutable snapshot of a medical record's clinical notes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicalNoteVersion {
    pub id: i64,
    pub medical_record_id: i64,
    /// The doctor who authored this version.
    pub doctor_id: String,
    pub notes: String,
    /// Starts at 1 and increases by one per commit on the same medical record.
    pub version_number: i64,
    pub change_reason: Option<String>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// A version decorated with its author's display metadata.
///
/// The author fields are `None` when the doctor is not registered in the directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicalNoteHistoryEntry {
    pub version: ClinicalNoteVersion,
    pub doctor_name: Option<String>,
    pub doctor_specialization: Option<String>,
}

/// Input for [`insert_version`].
#[derive(Clone, Debug)]
pub struct NewClinicalNoteVersion<'a> {
    pub medical_record_id: i64,
    pub doctor_id: &'a str,
    pub notes: &'a str,
    pub version_number: i64,
    pub change_reason: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

const VERSION_COLUMNS: &str = "cnv.id, cnv.medical_record_id, cnv.doctor_id, cnv.notes, \
     cnv.version_number, cnv.change_reason, cnv.is_current, cnv.created_at";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ClinicalNoteVersion> {
    Ok(ClinicalNoteVersion {
        id: row.get(0)?,
        medical_record_id: row.get(1)?,
        doctor_id: row.get(2)?,
        notes: row.get(3)?,
        version_number: row.get(4)?,
        change_reason: row.get(5)?,
        is_current: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Whether the version table has been provisioned on this connection's database.
pub fn versions_provisioned(conn: &Connection) -> RecordResult<bool> {
    Ok(provisioning_state(conn)?.has_note_versions())
}

/// Lists a record's versions, newest version number first.
///
/// Returns an empty list when the version table is not provisioned.
pub fn list_versions(
    conn: &Connection,
    medical_record_id: i64,
) -> RecordResult<Vec<ClinicalNoteVersion>> {
    if !versions_provisioned(conn)? {
        tracing::warn!(
            "clinical note versions not provisioned; returning no versions for record {}",
            medical_record_id
        );
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS}
         FROM clinical_note_versions cnv
         WHERE cnv.medical_record_id = ?1
         ORDER BY cnv.version_number DESC"
    ))?;
    let versions = stmt
        .query_map(params![medical_record_id], version_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Lists a record's versions joined with author display metadata, newest first.
///
/// Returns an empty list when the version table is not provisioned.
pub fn list_history(
    conn: &Connection,
    medical_record_id: i64,
) -> RecordResult<Vec<ClinicalNoteHistoryEntry>> {
    if !versions_provisioned(conn)? {
        tracing::warn!(
            "clinical note versions not provisioned; returning empty history for record {}",
            medical_record_id
        );
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS}, d.name, d.specialization
         FROM clinical_note_versions cnv
         LEFT JOIN doctors d ON cnv.doctor_id = d.id
         WHERE cnv.medical_record_id = ?1
         ORDER BY cnv.version_number DESC"
    ))?;
    let entries = stmt
        .query_map(params![medical_record_id], |row| {
            Ok(ClinicalNoteHistoryEntry {
                version: version_from_row(row)?,
                doctor_name: row.get(8)?,
                doctor_specialization: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Highest version number committed for the record, or 0 if there is none.
///
/// Also 0 when the version table is not provisioned.
pub fn latest_version_number(conn: &Connection, medical_record_id: i64) -> RecordResult<i64> {
    if !versions_provisioned(conn)? {
        return Ok(0);
    }

    let latest: Option<i64> = conn.query_row(
        "SELECT MAX(version_number) FROM clinical_note_versions WHERE medical_record_id = ?1",
        params![medical_record_id],
        |row| row.get(0),
    )?;
    Ok(latest.unwrap_or(0))
}

/// The version flagged as current, if any.
pub fn current_version(
    conn: &Connection,
    medical_record_id: i64,
) -> RecordResult<Option<ClinicalNoteVersion>> {
    if !versions_provisioned(conn)? {
        return Ok(None);
    }

    let version = conn
        .query_row(
            &format!(
                "SELECT {VERSION_COLUMNS}
                 FROM clinical_note_versions cnv
                 WHERE cnv.medical_record_id = ?1 AND cnv.is_current = 1"
            ),
            params![medical_record_id],
            version_from_row,
        )
        .optional()?;
    Ok(version)
}

/// Clears the current flag on the record's versions and returns how many rows changed.
///
/// A no-op when the record has no versions or the table is not provisioned.
pub fn mark_all_not_current(conn: &Connection, medical_record_id: i64) -> RecordResult<usize> {
    if !versions_provisioned(conn)? {
        return Ok(0);
    }

    conn.execute(
        "UPDATE clinical_note_versions SET is_current = 0
         WHERE medical_record_id = ?1 AND is_current = 1",
        params![medical_record_id],
    )
    .map_err(RecordError::from_write)
}

/// Inserts a new version flagged as current.
///
/// Callers must clear the previous current version first, in the same transaction.
///
/// # Errors
///
/// - [`RecordError::StorageUnavailable`] if the version table is not provisioned.
/// - [`RecordError::Conflict`] if the version number is taken or another version is still
///   current.
pub fn insert_version(
    conn: &Connection,
    new: &NewClinicalNoteVersion<'_>,
) -> RecordResult<ClinicalNoteVersion> {
    if !versions_provisioned(conn)? {
        return Err(RecordError::StorageUnavailable(
            "clinical note version table is not provisioned".into(),
        ));
    }

    conn.query_row(
        "INSERT INTO clinical_note_versions
             (medical_record_id, doctor_id, notes, version_number, change_reason, is_current, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
         RETURNING id, medical_record_id, doctor_id, notes, version_number, change_reason,
                   is_current, created_at",
        params![
            new.medical_record_id,
            new.doctor_id,
            new.notes,
            new.version_number,
            new.change_reason,
            new.created_at,
        ],
        version_from_row,
    )
    .map_err(RecordError::from_write)
}

/// Number of versions stored for the record.
pub fn count_versions(conn: &Connection, medical_record_id: i64) -> RecordResult<i64> {
    if !versions_provisioned(conn)? {
        return Ok(0);
    }

    Ok(conn.query_row(
        "SELECT COUNT(*) FROM clinical_note_versions WHERE medical_record_id = ?1",
        params![medical_record_id],
        |row| row.get(0),
    )?)
}
