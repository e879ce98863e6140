//! Doctor directory service.

use crate::config::CoreConfig;
use crate::store::doctors::{self, Doctor};
use crate::store::{self, schema};
use crate::{RecordError, RecordResult};
use chrono::Utc;
use hms_types::NonEmptyText;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct DoctorService {
    cfg: Arc<CoreConfig>,
}

impl DoctorService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Registers a doctor, or refreshes the display metadata of an existing one.
    pub fn register(&self, id: &str, name: &str, specialization: &str) -> RecordResult<Doctor> {
        let field = |value: &str, label: &str| {
            NonEmptyText::new(value)
                .map(NonEmptyText::into_inner)
                .map_err(|_| RecordError::Validation(format!("{label} is required")))
        };
        let doctor = Doctor {
            id: field(id, "id")?,
            name: field(name, "name")?,
            specialization: field(specialization, "specialization")?,
        };

        let conn = store::open_connection(&self.cfg)?;
        if !schema::provisioning_state(&conn)?.has_records() {
            return Err(RecordError::StorageUnavailable(
                "doctor table is not provisioned".into(),
            ));
        }
        doctors::upsert_doctor(&conn, &doctor, Utc::now())?;
        tracing::info!("registered doctor {}", doctor.id);
        Ok(doctor)
    }

    pub fn get(&self, id: &str) -> RecordResult<Option<Doctor>> {
        let conn = store::open_connection(&self.cfg)?;
        doctors::get_doctor(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::medical_records::MedicalRecordService;
    use crate::store::test_support::provisioned_cfg;
    use crate::NewMedicalRecord;
    use tempfile::TempDir;

    #[test]
    fn test_register_rejects_blank_fields() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let service = DoctorService::new(provisioned_cfg(dir.path()));

        assert!(matches!(
            service.register("doctor-a", " ", "Cardiology"),
            Err(RecordError::Validation(_))
        ));
        assert_eq!(service.get("doctor-a").unwrap(), None);
    }

    #[test]
    fn test_registered_doctor_decorates_history() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = provisioned_cfg(dir.path());
        DoctorService::new(cfg.clone())
            .register("doctor-a", "Dr. Ana Ruiz", "Cardiology")
            .unwrap();

        let record = MedicalRecordService::new(cfg.clone())
            .create(NewMedicalRecord {
                patient_id: "patient-1".into(),
                doctor_id: "doctor-a".into(),
                appointment_id: 1,
                ..Default::default()
            })
            .unwrap();
        record.commit_note("doctor-a", "stable", None).unwrap();

        let history = record.list_history().unwrap();
        assert_eq!(history[0].doctor_name.as_deref(), Some("Dr. Ana Ruiz"));
        assert_eq!(
            history[0].doctor_specialization.as_deref(),
            Some("Cardiology")
        );
    }
}
