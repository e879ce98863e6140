//! Doctor directory used to decorate clinical note history with display metadata.

use crate::{RecordError, RecordResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Doctor {
    /// Identity-provider user id of the doctor.
    pub id: String,
    pub name: String,
    pub specialization: String,
}

/// Inserts the doctor or refreshes their display metadata.
pub fn upsert_doctor(conn: &Connection, doctor: &Doctor, now: DateTime<Utc>) -> RecordResult<()> {
    conn.execute(
        "INSERT INTO doctors (id, name, specialization, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT (id) DO UPDATE SET
             name = excluded.name,
             specialization = excluded.specialization,
             updated_at = excluded.updated_at",
        params![doctor.id, doctor.name, doctor.specialization, now],
    )
    .map_err(RecordError::from_write)?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &str) -> RecordResult<Option<Doctor>> {
    let doctor = conn
        .query_row(
            "SELECT id, name, specialization FROM doctors WHERE id = ?1",
            params![id],
            |row| {
                Ok(Doctor {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    specialization: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(doctor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::provision;

    #[test]
    fn upsert_refreshes_metadata() {
        let mut conn = Connection::open_in_memory().unwrap();
        provision(&mut conn).unwrap();

        let mut doctor = Doctor {
            id: "doctor-a".into(),
            name: "Dr. Ana Ruiz".into(),
            specialization: "General Practice".into(),
        };
        upsert_doctor(&conn, &doctor, Utc::now()).unwrap();
        doctor.specialization = "Cardiology".into();
        upsert_doctor(&conn, &doctor, Utc::now()).unwrap();

        assert_eq!(get_doctor(&conn, "doctor-a").unwrap(), Some(doctor));
        assert_eq!(get_doctor(&conn, "doctor-b").unwrap(), None);
    }
}
