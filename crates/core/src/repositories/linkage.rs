//! Record linkage: keeps `medical_records.notes` in step with the current note version.
//!
//! The version table is the source of truth. [`sync_record_notes`] runs inside the commit
//! transaction; [`reconcile_record`] is an idempotent repair for records whose denormalised
//! notes have drifted.

use crate::store::{records, versions};
use crate::store::versions::ClinicalNoteVersion;
use crate::{RecordError, RecordResult};
use chrono::Utc;
use rusqlite::Connection;

#[cfg(test)]
use std::collections::HashSet;
#[cfg(test)]
use std::sync::{LazyLock, Mutex};

/// Result of reconciling one medical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record already mirrored its current version.
    InSync,
    /// The record's notes were rewritten from the current version.
    Repaired,
    /// The record has no current version to mirror.
    NoCurrentVersion,
}

/// Totals from reconciling every medical record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub repaired: usize,
    pub without_current_version: usize,
}

impl ReconcileReport {
    pub(crate) fn record(&mut self, outcome: ReconcileOutcome) {
        self.examined += 1;
        match outcome {
            ReconcileOutcome::InSync => {}
            ReconcileOutcome::Repaired => self.repaired += 1,
            ReconcileOutcome::NoCurrentVersion => self.without_current_version += 1,
        }
    }
}

/// Copies a freshly committed version's text onto its medical record.
pub(crate) fn sync_record_notes(
    conn: &Connection,
    version: &ClinicalNoteVersion,
) -> RecordResult<()> {
    #[cfg(test)]
    {
        let current_id = std::thread::current().id();
        let mut guard = FORCE_LINKAGE_FAILURE_FOR_THREADS
            .lock()
            .expect("FORCE_LINKAGE_FAILURE_FOR_THREADS mutex poisoned");
        if guard.remove(&current_id) {
            return Err(RecordError::StorageUnavailable(
                "forced linkage failure (test hook)".into(),
            ));
        }
    }

    let updated = records::update_notes(
        conn,
        version.medical_record_id,
        &version.notes,
        version.created_at,
    )?;
    if updated != 1 {
        return Err(RecordError::NotFound(version.medical_record_id));
    }
    Ok(())
}

/// Rewrites the record's notes from its current version when they differ.
pub(crate) fn reconcile_record(
    conn: &Connection,
    medical_record_id: i64,
) -> RecordResult<ReconcileOutcome> {
    let record = records::get_record(conn, medical_record_id)?
        .ok_or(RecordError::NotFound(medical_record_id))?;

    let Some(current) = versions::current_version(conn, medical_record_id)? else {
        return Ok(ReconcileOutcome::NoCurrentVersion);
    };

    if record.notes.as_deref() == Some(current.notes.as_str()) {
        return Ok(ReconcileOutcome::InSync);
    }

    records::update_notes(conn, medical_record_id, &current.notes, Utc::now())?;
    tracing::info!(
        "reconciled notes of medical record {} from version {}",
        medical_record_id,
        current.version_number
    );
    Ok(ReconcileOutcome::Repaired)
}

#[cfg(test)]
static FORCE_LINKAGE_FAILURE_FOR_THREADS: LazyLock<Mutex<HashSet<std::thread::ThreadId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

#[cfg(test)]
pub(crate) fn force_linkage_failure_for_current_thread() {
    let mut guard = FORCE_LINKAGE_FAILURE_FOR_THREADS
        .lock()
        .expect("FORCE_LINKAGE_FAILURE_FOR_THREADS mutex poisoned");
    guard.insert(std::thread::current().id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::provision;
    use crate::store::versions::{insert_version, NewClinicalNoteVersion};
    use rusqlite::params;

    fn conn_with_record() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        provision(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO medical_records
                 (id, patient_id, doctor_id, appointment_id, notes, created_at, updated_at)
             VALUES (3, 'patient-3', 'doctor-a', 30, 'stale', ?1, ?1)",
            params![Utc::now()],
        )
        .unwrap();
        conn
    }

    #[test]
    fn reconcile_without_versions_changes_nothing() {
        let conn = conn_with_record();
        assert_eq!(
            reconcile_record(&conn, 3).unwrap(),
            ReconcileOutcome::NoCurrentVersion
        );
        let record = records::get_record(&conn, 3).unwrap().unwrap();
        assert_eq!(record.notes.as_deref(), Some("stale"));
    }

    #[test]
    fn reconcile_repairs_then_is_idempotent() {
        let conn = conn_with_record();
        insert_version(
            &conn,
            &NewClinicalNoteVersion {
                medical_record_id: 3,
                doctor_id: "doctor-a",
                notes: "fresh",
                version_number: 1,
                change_reason: None,
                created_at: Utc::now(),
            },
        )
        .unwrap();

        assert_eq!(reconcile_record(&conn, 3).unwrap(), ReconcileOutcome::Repaired);
        assert_eq!(reconcile_record(&conn, 3).unwrap(), ReconcileOutcome::InSync);
        let record = records::get_record(&conn, 3).unwrap().unwrap();
        assert_eq!(record.notes.as_deref(), Some("fresh"));
    }

    #[test]
    fn reconcile_unknown_record_is_not_found() {
        let conn = conn_with_record();
        assert!(matches!(
            reconcile_record(&conn, 99),
            Err(RecordError::NotFound(99))
        ));
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = ReconcileReport::default();
        report.record(ReconcileOutcome::InSync);
        report.record(ReconcileOutcome::Repaired);
        report.record(ReconcileOutcome::NoCurrentVersion);
        report.record(ReconcileOutcome::Repaired);

        assert_eq!(
            report,
            ReconcileReport {
                examined: 4,
                repaired: 2,
                without_current_version: 1,
            }
        );
    }
}
