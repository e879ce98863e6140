//! Request and response types for the HMS APIs.
//!
//! Every successful response is wrapped as `{ success: true, data }`; failures are
//! `{ success: false, error }` with a message that is safe to show to users. Timestamps are
//! RFC 3339 strings.

use hms_core::{
    ClinicalNoteHistoryEntry, ClinicalNoteVersion, Doctor, MedicalRecord, ReconcileOutcome,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    /// Schema provisioning state: `unprovisioned`, `records-only`, `complete` or `unknown`.
    pub schema: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub error: String,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Body of `POST /medical-records/{id}/clinical-notes`.
///
/// `notes` is optional at the wire level so a missing field is reported as a validation error
/// rather than a deserialisation failure.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CommitNoteReq {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub change_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClinicalNoteVersionDto {
    pub id: i64,
    pub medical_record_id: i64,
    pub doctor_id: String,
    pub notes: String,
    pub version_number: i64,
    pub change_reason: Option<String>,
    pub is_current: bool,
    pub created_at: String,
}

impl From<ClinicalNoteVersion> for ClinicalNoteVersionDto {
    fn from(v: ClinicalNoteVersion) -> Self {
        Self {
            id: v.id,
            medical_record_id: v.medical_record_id,
            doctor_id: v.doctor_id,
            notes: v.notes,
            version_number: v.version_number,
            change_reason: v.change_reason,
            is_current: v.is_current,
            created_at: v.created_at.to_rfc3339(),
        }
    }
}

/// A history entry: a version plus its author's display metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClinicalNoteHistoryEntryDto {
    pub id: i64,
    pub medical_record_id: i64,
    pub doctor_id: String,
    pub notes: String,
    pub version_number: i64,
    pub change_reason: Option<String>,
    pub is_current: bool,
    pub created_at: String,
    pub doctor_name: Option<String>,
    pub doctor_specialization: Option<String>,
}

impl From<ClinicalNoteHistoryEntry> for ClinicalNoteHistoryEntryDto {
    fn from(entry: ClinicalNoteHistoryEntry) -> Self {
        let v = entry.version;
        Self {
            id: v.id,
            medical_record_id: v.medical_record_id,
            doctor_id: v.doctor_id,
            notes: v.notes,
            version_number: v.version_number,
            change_reason: v.change_reason,
            is_current: v.is_current,
            created_at: v.created_at.to_rfc3339(),
            doctor_name: entry.doctor_name,
            doctor_specialization: entry.doctor_specialization,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ClinicalNoteListRes {
    pub success: bool,
    pub data: Vec<ClinicalNoteHistoryEntryDto>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ClinicalNoteRes {
    pub success: bool,
    pub data: ClinicalNoteVersionDto,
}

/// Body of `POST /medical-records`.
///
/// When a doctor creates the record and omits `doctor_id`, the caller is assigned.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateMedicalRecordReq {
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    pub appointment_id: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub prescriptions: Option<String>,
    #[serde(default)]
    pub lab_request: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MedicalRecordDto {
    pub id: i64,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_id: i64,
    pub notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub prescriptions: Option<String>,
    pub lab_request: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MedicalRecord> for MedicalRecordDto {
    fn from(r: MedicalRecord) -> Self {
        Self {
            id: r.id,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            appointment_id: r.appointment_id,
            notes: r.notes,
            treatment_plan: r.treatment_plan,
            prescriptions: r.prescriptions,
            lab_request: r.lab_request,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicalRecordRes {
    pub success: bool,
    pub data: MedicalRecordDto,
}

/// Body of `POST /doctors`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisterDoctorReq {
    pub id: String,
    pub name: String,
    pub specialization: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DoctorDto {
    pub id: String,
    pub name: String,
    pub specialization: String,
}

impl From<Doctor> for DoctorDto {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id,
            name: d.name,
            specialization: d.specialization,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub success: bool,
    pub data: DoctorDto,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileData {
    /// `in_sync`, `repaired` or `no_current_version`.
    pub outcome: String,
}

impl From<ReconcileOutcome> for ReconcileData {
    fn from(outcome: ReconcileOutcome) -> Self {
        let outcome = match outcome {
            ReconcileOutcome::InSync => "in_sync",
            ReconcileOutcome::Repaired => "repaired",
            ReconcileOutcome::NoCurrentVersion => "no_current_version",
        };
        Self {
            outcome: outcome.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileRes {
    pub success: bool,
    pub data: ReconcileData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_note_req_tolerates_missing_fields() {
        let req: CommitNoteReq = serde_json::from_str("{}").unwrap();
        assert!(req.notes.is_none());
        assert!(req.change_reason.is_none());

        let req: CommitNoteReq =
            serde_json::from_str(r#"{"notes":"stable","change_reason":"follow-up"}"#).unwrap();
        assert_eq!(req.notes.as_deref(), Some("stable"));
        assert_eq!(req.change_reason.as_deref(), Some("follow-up"));
    }

    #[test]
    fn error_res_is_marked_unsuccessful() {
        let json = serde_json::to_value(ErrorRes::new("Notes are required")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Notes are required" })
        );
    }

    #[test]
    fn reconcile_outcome_uses_snake_case() {
        assert_eq!(
            ReconcileData::from(ReconcileOutcome::NoCurrentVersion).outcome,
            "no_current_version"
        );
    }
}
