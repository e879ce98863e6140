//! Medical records and their versioned clinical notes.
//!
//! A medical record is created when an appointment is completed. From then on its clinical notes
//! only change through [`MedicalRecordService::commit_note`], which appends an immutable version,
//! supersedes the previous current version and mirrors the new text onto the record. All of that
//! happens in one immediate SQLite transaction, so concurrent commits on a record are linearised
//! and a failure part-way leaves the database exactly as it was.
//!
//! # Authorisation
//!
//! This module does not authenticate callers. Callers must only invoke
//! [`commit_note`](MedicalRecordService::commit_note) for an authenticated actor holding the
//! doctor capability; any authenticated actor may read history.

use crate::config::{AmendmentPolicy, CoreConfig};
use crate::constants::{COMMIT_CONFLICT_RETRIES, INITIAL_NOTES_CHANGE_REASON, MAX_NOTE_BYTES};
use crate::repositories::linkage::{self, ReconcileOutcome, ReconcileReport};
use crate::store::records::{self, MedicalRecord, NewMedicalRecord};
use crate::store::versions::{
    self, ClinicalNoteHistoryEntry, ClinicalNoteVersion, NewClinicalNoteVersion,
};
use crate::store::{self, schema};
use crate::{RecordError, RecordResult};
use chrono::Utc;
use hms_types::{NonEmptyText, VerbatimText};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;

/// Marker type: the medical record does not exist yet.
///
/// A [`MedicalRecordService`] in this state can only [`create`](MedicalRecordService::create)
/// a record or run database-wide maintenance.
#[derive(Clone, Copy, Debug)]
pub struct Uninitialised;

/// Marker type: the service is bound to one medical record id.
#[derive(Clone, Copy, Debug)]
pub struct Initialised {
    medical_record_id: i64,
}

/// Service for medical record and clinical note operations.
///
/// Uses the type-state pattern: `MedicalRecordService<Uninitialised>` comes from
/// [`new()`](MedicalRecordService::new), `MedicalRecordService<Initialised>` from
/// [`with_id()`](MedicalRecordService::with_id) or a successful
/// [`create()`](MedicalRecordService::create).
#[derive(Clone, Debug)]
pub struct MedicalRecordService<S> {
    cfg: Arc<CoreConfig>,
    state: S,
}

impl MedicalRecordService<Uninitialised> {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            state: Uninitialised,
        }
    }

    /// Creates a medical record for a completed appointment.
    ///
    /// **This method consumes `self`** and returns a service bound to the new record.
    ///
    /// Non-blank initial notes become clinical note version 1, authored by the record's doctor,
    /// when the version table is provisioned. Otherwise the provisioning backfill picks them up
    /// later.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Validation`] if the patient id, doctor id or appointment id is missing,
    ///   or the initial notes are too long.
    /// - [`RecordError::Conflict`] if the appointment already has a medical record.
    /// - [`RecordError::StorageUnavailable`] if the database cannot be opened or the record
    ///   tables are not provisioned.
    pub fn create(self, new: NewMedicalRecord) -> RecordResult<MedicalRecordService<Initialised>> {
        let patient_id = NonEmptyText::new(&new.patient_id)
            .map_err(|_| RecordError::Validation("patient_id is required".into()))?;
        let doctor_id = NonEmptyText::new(&new.doctor_id)
            .map_err(|_| RecordError::Validation("doctor_id is required".into()))?;
        if new.appointment_id <= 0 {
            return Err(RecordError::Validation(
                "appointment_id must be a positive integer".into(),
            ));
        }
        let notes = match new.notes {
            Some(notes) if !notes.trim().is_empty() => Some(note_text(notes)?),
            _ => None,
        };

        let normalised = NewMedicalRecord {
            patient_id: patient_id.into_inner(),
            doctor_id: doctor_id.into_inner(),
            appointment_id: new.appointment_id,
            notes: notes.map(VerbatimText::into_inner),
            treatment_plan: optional_text(new.treatment_plan),
            prescriptions: optional_text(new.prescriptions),
            lab_request: optional_text(new.lab_request),
        };

        let mut conn = store::open_connection(&self.cfg)?;
        let tx = begin_write(&mut conn)?;
        let state = schema::provisioning_state(&tx)?;
        if !state.has_records() {
            return Err(RecordError::StorageUnavailable(
                "medical record tables are not provisioned".into(),
            ));
        }

        let now = Utc::now();
        let record = records::insert_record(&tx, &normalised, now)?;
        if let (Some(notes), true) = (record.notes.as_deref(), state.has_note_versions()) {
            versions::insert_version(
                &tx,
                &NewClinicalNoteVersion {
                    medical_record_id: record.id,
                    doctor_id: &record.doctor_id,
                    notes,
                    version_number: 1,
                    change_reason: Some(INITIAL_NOTES_CHANGE_REASON),
                    created_at: now,
                },
            )?;
        }
        tx.commit().map_err(RecordError::from_write)?;

        tracing::info!(
            "created medical record {} for appointment {}",
            record.id,
            record.appointment_id
        );

        Ok(MedicalRecordService {
            cfg: self.cfg,
            state: Initialised {
                medical_record_id: record.id,
            },
        })
    }

    /// Reconciles every medical record's notes with its current version.
    pub fn reconcile_all(&self) -> RecordResult<ReconcileReport> {
        let mut conn = store::open_connection(&self.cfg)?;
        let tx = begin_write(&mut conn)?;
        let mut report = ReconcileReport::default();
        if !schema::provisioning_state(&tx)?.has_records() {
            return Ok(report);
        }

        for id in records::list_record_ids(&tx)? {
            report.record(linkage::reconcile_record(&tx, id)?);
        }
        tx.commit().map_err(RecordError::from_write)?;

        tracing::info!(
            "reconciled {} medical records ({} repaired)",
            report.examined,
            report.repaired
        );
        Ok(report)
    }
}

impl MedicalRecordService<Initialised> {
    /// Binds a service to an existing medical record id.
    ///
    /// Existence is not checked here; operations on a missing record fail with
    /// [`RecordError::NotFound`] (reads of history simply return nothing).
    pub fn with_id(cfg: Arc<CoreConfig>, medical_record_id: i64) -> Self {
        Self {
            cfg,
            state: Initialised { medical_record_id },
        }
    }

    pub fn medical_record_id(&self) -> i64 {
        self.state.medical_record_id
    }

    pub fn get(&self) -> RecordResult<MedicalRecord> {
        let id = self.medical_record_id();
        let conn = store::open_connection(&self.cfg)?;
        if !schema::provisioning_state(&conn)?.has_records() {
            return Err(RecordError::StorageUnavailable(
                "medical record tables are not provisioned".into(),
            ));
        }
        records::get_record(&conn, id)?.ok_or(RecordError::NotFound(id))
    }

    /// Commits a new clinical note version and makes it current.
    ///
    /// The text is stored exactly as given. A blank `change_reason` is stored as `None`.
    /// One conflict (a racing writer or a lock timeout) is retried transparently.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Validation`] if `text` is blank or too long, or `doctor_id` is blank.
    ///   Nothing is written.
    /// - [`RecordError::NotFound`] if the medical record does not exist.
    /// - [`RecordError::NotAssignedDoctor`] under [`AmendmentPolicy::AssignedDoctor`] when the
    ///   caller is not the record's doctor.
    /// - [`RecordError::StorageUnavailable`] if the database cannot be opened or the version
    ///   table is not provisioned.
    /// - [`RecordError::Conflict`] if the write still conflicts after the retry.
    pub fn commit_note(
        &self,
        doctor_id: &str,
        text: &str,
        change_reason: Option<&str>,
    ) -> RecordResult<ClinicalNoteVersion> {
        let text = note_text(text)?;
        let doctor_id = NonEmptyText::new(doctor_id)
            .map_err(|_| RecordError::Validation("doctor id is required".into()))?;
        let change_reason = NonEmptyText::optional(change_reason);

        let mut attempt = 0;
        loop {
            match self.try_commit_note(&doctor_id, &text, change_reason.as_ref()) {
                Err(err) if err.is_conflict() && attempt < COMMIT_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::warn!(
                        "retrying clinical note commit on medical record {} after conflict: {}",
                        self.medical_record_id(),
                        err
                    );
                }
                result => return result,
            }
        }
    }

    fn try_commit_note(
        &self,
        doctor_id: &NonEmptyText,
        text: &VerbatimText,
        change_reason: Option<&NonEmptyText>,
    ) -> RecordResult<ClinicalNoteVersion> {
        let id = self.medical_record_id();
        let mut conn = store::open_connection(&self.cfg)?;
        let tx = begin_write(&mut conn)?;

        let state = schema::provisioning_state(&tx)?;
        if !state.has_records() {
            return Err(RecordError::StorageUnavailable(
                "medical record tables are not provisioned".into(),
            ));
        }

        let record = records::get_record(&tx, id)?.ok_or(RecordError::NotFound(id))?;
        if self.cfg.amendment_policy() == AmendmentPolicy::AssignedDoctor
            && record.doctor_id != doctor_id.as_str()
        {
            return Err(RecordError::NotAssignedDoctor);
        }

        if !state.has_note_versions() {
            return Err(RecordError::StorageUnavailable(
                "clinical note version table is not provisioned".into(),
            ));
        }

        let version_number = versions::latest_version_number(&tx, id)? + 1;
        let superseded = versions::mark_all_not_current(&tx, id)?;
        let version = versions::insert_version(
            &tx,
            &NewClinicalNoteVersion {
                medical_record_id: id,
                doctor_id: doctor_id.as_str(),
                notes: text.as_str(),
                version_number,
                change_reason: change_reason.map(NonEmptyText::as_str),
                created_at: Utc::now(),
            },
        )?;
        linkage::sync_record_notes(&tx, &version)?;
        tx.commit().map_err(RecordError::from_write)?;

        tracing::info!(
            "committed clinical note version {} on medical record {} ({} superseded)",
            version.version_number,
            id,
            superseded
        );
        Ok(version)
    }

    /// Lists the record's clinical note versions, newest first, with author metadata.
    ///
    /// Degrades to an empty list on any storage failure: an unreachable or unreadable database,
    /// or a version table that is not provisioned.
    pub fn list_history(&self) -> RecordResult<Vec<ClinicalNoteHistoryEntry>> {
        let id = self.medical_record_id();
        let history = store::open_connection(&self.cfg)
            .and_then(|conn| versions::list_history(&conn, id));
        match history {
            Ok(history) => Ok(history),
            Err(e) => {
                tracing::warn!(
                    "clinical note history for medical record {} unavailable: {}",
                    id,
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Repairs the record's notes from its current version if they have drifted.
    pub fn reconcile(&self) -> RecordResult<ReconcileOutcome> {
        let mut conn = store::open_connection(&self.cfg)?;
        let tx = begin_write(&mut conn)?;
        let outcome = linkage::reconcile_record(&tx, self.medical_record_id())?;
        tx.commit().map_err(RecordError::from_write)?;
        Ok(outcome)
    }
}

fn begin_write(conn: &mut Connection) -> RecordResult<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(RecordError::from_write)
}

/// Note text is stored as written; only blank or oversized text is rejected.
fn note_text(text: impl Into<String>) -> RecordResult<VerbatimText> {
    VerbatimText::new(text, MAX_NOTE_BYTES)
        .map_err(|e| RecordError::Validation(format!("notes: {e}")))
}

fn optional_text(value: Option<String>) -> Option<String> {
    NonEmptyText::optional(value).map(NonEmptyText::into_inner)
}
