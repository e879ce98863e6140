//! # HMS Core
//!
//! Core business logic for the hospital management system's clinical records:
//! - Medical records created when appointments are completed
//! - Append-only, versioned clinical notes with exactly one current version per record
//! - Denormalised "latest notes" on the medical record, with an idempotent repair
//! - Explicit schema provisioning for the SQLite store
//!
//! **No API concerns**: authentication, HTTP servers and role checks belong in `api-shared` and
//! `api-rest`.

pub mod config;
pub mod constants;
pub mod error;
pub mod repositories;
pub mod store;

pub use config::{AmendmentPolicy, CoreConfig};
pub use error::{RecordError, RecordResult};
pub use repositories::doctors::DoctorService;
pub use repositories::linkage::{ReconcileOutcome, ReconcileReport};
pub use repositories::medical_records::{Initialised, MedicalRecordService, Uninitialised};
pub use store::doctors::Doctor;
pub use store::records::{MedicalRecord, NewMedicalRecord};
pub use store::schema::{database_state, provision_database, ProvisioningState};
pub use store::versions::{ClinicalNoteHistoryEntry, ClinicalNoteVersion};
