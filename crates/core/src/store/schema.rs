//! Explicit, ordered schema provisioning.
//!
//! The applied level is stored in `PRAGMA user_version`. Repositories consult
//! [`provisioning_state`] instead of probing tables and intercepting "no such table" errors, so a
//! deployment whose version table has not been created yet is a well-defined state.

use crate::config::CoreConfig;
use crate::constants::INITIAL_NOTES_CHANGE_REASON;
use crate::{RecordError, RecordResult};
use rusqlite::{params, Connection, TransactionBehavior};

/// Level at which `doctors` and `medical_records` exist.
pub const SCHEMA_LEVEL_RECORDS: i64 = 1;
/// Level at which `clinical_note_versions` exists and has been backfilled.
pub const SCHEMA_LEVEL_NOTE_VERSIONS: i64 = 2;
pub const LATEST_SCHEMA_LEVEL: i64 = SCHEMA_LEVEL_NOTE_VERSIONS;

const RECORDS_SQL: &str = "
CREATE TABLE IF NOT EXISTS doctors (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    specialization TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS medical_records (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id     TEXT NOT NULL,
    doctor_id      TEXT NOT NULL,
    appointment_id INTEGER NOT NULL UNIQUE,
    notes          TEXT,
    treatment_plan TEXT,
    prescriptions  TEXT,
    lab_request    TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
";

const NOTE_VERSIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS clinical_note_versions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    medical_record_id INTEGER NOT NULL REFERENCES medical_records (id),
    doctor_id         TEXT NOT NULL,
    notes             TEXT NOT NULL,
    version_number    INTEGER NOT NULL CHECK (version_number >= 1),
    change_reason     TEXT,
    is_current        INTEGER NOT NULL DEFAULT 0 CHECK (is_current IN (0, 1)),
    created_at        TEXT NOT NULL,
    UNIQUE (medical_record_id, version_number)
);

CREATE UNIQUE INDEX IF NOT EXISTS clinical_note_versions_one_current
    ON clinical_note_versions (medical_record_id)
    WHERE is_current = 1;

CREATE TRIGGER IF NOT EXISTS clinical_note_versions_immutable
    BEFORE UPDATE OF medical_record_id, doctor_id, notes, version_number, change_reason, created_at
    ON clinical_note_versions
BEGIN
    SELECT RAISE(ABORT, 'clinical note versions are immutable');
END;

CREATE TRIGGER IF NOT EXISTS clinical_note_versions_no_promotion
    BEFORE UPDATE OF is_current ON clinical_note_versions
    WHEN NEW.is_current = 1 AND OLD.is_current = 0
BEGIN
    SELECT RAISE(ABORT, 'a superseded clinical note version cannot become current again');
END;

CREATE TRIGGER IF NOT EXISTS clinical_note_versions_no_delete
    BEFORE DELETE ON clinical_note_versions
BEGIN
    SELECT RAISE(ABORT, 'clinical note versions cannot be deleted');
END;
";

// Records that already carry notes get them as version 1, so the version table stays the
// source of truth from the moment it exists.
const NOTE_VERSIONS_BACKFILL_SQL: &str = "
INSERT INTO clinical_note_versions
    (medical_record_id, doctor_id, notes, version_number, change_reason, is_current, created_at)
SELECT mr.id, mr.doctor_id, mr.notes, 1, ?1, 1, mr.updated_at
FROM medical_records mr
WHERE mr.notes IS NOT NULL
  AND trim(mr.notes) <> ''
  AND NOT EXISTS (
      SELECT 1 FROM clinical_note_versions cnv WHERE cnv.medical_record_id = mr.id
  )
";

/// How far the schema has been provisioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisioningState {
    /// Nothing has been applied.
    Unprovisioned,
    /// Record tables exist; the clinical note version table does not.
    RecordsOnly,
    /// Every migration has been applied.
    Complete,
}

impl ProvisioningState {
    fn from_level(level: i64) -> Self {
        match level {
            l if l >= SCHEMA_LEVEL_NOTE_VERSIONS => Self::Complete,
            l if l >= SCHEMA_LEVEL_RECORDS => Self::RecordsOnly,
            _ => Self::Unprovisioned,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::RecordsOnly => "records-only",
            Self::Complete => "complete",
        }
    }

    pub fn has_records(self) -> bool {
        !matches!(self, Self::Unprovisioned)
    }

    pub fn has_note_versions(self) -> bool {
        matches!(self, Self::Complete)
    }
}

pub fn schema_level(conn: &Connection) -> RecordResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub fn provisioning_state(conn: &Connection) -> RecordResult<ProvisioningState> {
    Ok(ProvisioningState::from_level(schema_level(conn)?))
}

/// Applies every outstanding migration.
pub fn provision(conn: &mut Connection) -> RecordResult<ProvisioningState> {
    provision_to(conn, LATEST_SCHEMA_LEVEL)
}

/// Applies outstanding migrations up to and including `target`.
///
/// Idempotent: levels that are already applied are skipped. All migrations run inside a single
/// immediate transaction, so a failure leaves the schema at its previous level.
///
/// # Errors
///
/// Returns [`RecordError::InvalidInput`] if `target` is outside `0..=LATEST_SCHEMA_LEVEL`.
pub fn provision_to(conn: &mut Connection, target: i64) -> RecordResult<ProvisioningState> {
    if !(0..=LATEST_SCHEMA_LEVEL).contains(&target) {
        return Err(RecordError::InvalidInput(format!(
            "schema level {target} is not between 0 and {LATEST_SCHEMA_LEVEL}"
        )));
    }

    // journal_mode cannot change inside a transaction.
    let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!("journal mode is {}", journal_mode);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = schema_level(&tx)?;

    if current < SCHEMA_LEVEL_RECORDS && target >= SCHEMA_LEVEL_RECORDS {
        tx.execute_batch(RECORDS_SQL)?;
        tx.pragma_update(None, "user_version", SCHEMA_LEVEL_RECORDS)?;
        tracing::info!("applied schema level {}", SCHEMA_LEVEL_RECORDS);
    }

    if current < SCHEMA_LEVEL_NOTE_VERSIONS && target >= SCHEMA_LEVEL_NOTE_VERSIONS {
        tx.execute_batch(NOTE_VERSIONS_SQL)?;
        let backfilled =
            tx.execute(NOTE_VERSIONS_BACKFILL_SQL, params![INITIAL_NOTES_CHANGE_REASON])?;
        tx.pragma_update(None, "user_version", SCHEMA_LEVEL_NOTE_VERSIONS)?;
        tracing::info!(
            "applied schema level {} (backfilled {} clinical note versions)",
            SCHEMA_LEVEL_NOTE_VERSIONS,
            backfilled
        );
    }

    let state = provisioning_state(&tx)?;
    tx.commit()?;
    Ok(state)
}

/// Opens (creating if necessary) the configured database and provisions it fully.
pub fn provision_database(cfg: &CoreConfig) -> RecordResult<ProvisioningState> {
    let mut conn = super::open_or_create(cfg)?;
    provision(&mut conn)
}

/// Reports the provisioning state of the configured database without changing it.
pub fn database_state(cfg: &CoreConfig) -> RecordResult<ProvisioningState> {
    let conn = super::open_connection(cfg)?;
    provisioning_state(&conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        Connection::open_in_memory().expect("in-memory database should open")
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .expect("sqlite_master query should succeed")
            == 1
    }

    #[test]
    fn fresh_database_is_unprovisioned() {
        let conn = memory_conn();
        assert_eq!(
            provisioning_state(&conn).unwrap(),
            ProvisioningState::Unprovisioned
        );
    }

    #[test]
    fn provision_creates_all_tables() {
        let mut conn = memory_conn();
        let state = provision(&mut conn).expect("provision should succeed");

        assert_eq!(state, ProvisioningState::Complete);
        assert!(table_exists(&conn, "doctors"));
        assert!(table_exists(&conn, "medical_records"));
        assert!(table_exists(&conn, "clinical_note_versions"));
    }

    #[test]
    fn provision_to_records_level_leaves_versions_unprovisioned() {
        let mut conn = memory_conn();
        let state = provision_to(&mut conn, SCHEMA_LEVEL_RECORDS).unwrap();

        assert_eq!(state, ProvisioningState::RecordsOnly);
        assert!(table_exists(&conn, "medical_records"));
        assert!(!table_exists(&conn, "clinical_note_versions"));
    }

    #[test]
    fn provision_is_idempotent() {
        let mut conn = memory_conn();
        provision(&mut conn).unwrap();
        let state = provision(&mut conn).expect("second provision should succeed");
        assert_eq!(state, ProvisioningState::Complete);
        assert_eq!(schema_level(&conn).unwrap(), LATEST_SCHEMA_LEVEL);
    }

    #[test]
    fn provision_rejects_unknown_level() {
        let mut conn = memory_conn();
        assert!(matches!(
            provision_to(&mut conn, LATEST_SCHEMA_LEVEL + 1),
            Err(RecordError::InvalidInput(_))
        ));
    }

    #[test]
    fn upgrade_backfills_existing_notes_as_version_one() {
        let mut conn = memory_conn();
        provision_to(&mut conn, SCHEMA_LEVEL_RECORDS).unwrap();
        conn.execute_batch(
            "INSERT INTO medical_records
                 (id, patient_id, doctor_id, appointment_id, notes, created_at, updated_at)
             VALUES
                 (1, 'patient-1', 'doctor-1', 10, 'Patient stable', '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00'),
                 (2, 'patient-2', 'doctor-1', 11, NULL, '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00'),
                 (3, 'patient-3', 'doctor-2', 12, '   ', '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00');",
        )
        .unwrap();

        provision(&mut conn).unwrap();

        let rows: Vec<(i64, String, i64, bool, Option<String>)> = conn
            .prepare(
                "SELECT medical_record_id, notes, version_number, is_current, change_reason
                 FROM clinical_note_versions ORDER BY medical_record_id",
            )
            .unwrap()
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![(
                1,
                "Patient stable".to_string(),
                1,
                true,
                Some(INITIAL_NOTES_CHANGE_REASON.to_string())
            )]
        );
    }

    #[test]
    fn versions_cannot_be_deleted_or_edited() {
        let mut conn = memory_conn();
        provision(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO medical_records
                 (id, patient_id, doctor_id, appointment_id, created_at, updated_at)
             VALUES (1, 'patient-1', 'doctor-1', 10, '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00');
             INSERT INTO clinical_note_versions
                 (medical_record_id, doctor_id, notes, version_number, is_current, created_at)
             VALUES (1, 'doctor-1', 'first', 1, 1, '2024-01-01 09:00:00+00:00');",
        )
        .unwrap();

        assert!(conn
            .execute("DELETE FROM clinical_note_versions", [])
            .is_err());
        assert!(conn
            .execute("UPDATE clinical_note_versions SET notes = 'changed'", [])
            .is_err());
        assert!(conn
            .execute("UPDATE clinical_note_versions SET version_number = 5", [])
            .is_err());
    }

    #[test]
    fn superseded_version_cannot_become_current_again() {
        let mut conn = memory_conn();
        provision(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO medical_records
                 (id, patient_id, doctor_id, appointment_id, created_at, updated_at)
             VALUES (1, 'patient-1', 'doctor-1', 10, '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00');
             INSERT INTO clinical_note_versions
                 (medical_record_id, doctor_id, notes, version_number, is_current, created_at)
             VALUES (1, 'doctor-1', 'first', 1, 0, '2024-01-01 09:00:00+00:00');",
        )
        .unwrap();

        assert!(conn
            .execute("UPDATE clinical_note_versions SET is_current = 1", [])
            .is_err());
    }

    #[test]
    fn engine_rejects_second_current_version_and_duplicate_numbers() {
        let mut conn = memory_conn();
        provision(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO medical_records
                 (id, patient_id, doctor_id, appointment_id, created_at, updated_at)
             VALUES (1, 'patient-1', 'doctor-1', 10, '2024-01-01 09:00:00+00:00', '2024-01-01 09:00:00+00:00');
             INSERT INTO clinical_note_versions
                 (medical_record_id, doctor_id, notes, version_number, is_current, created_at)
             VALUES (1, 'doctor-1', 'first', 1, 1, '2024-01-01 09:00:00+00:00');",
        )
        .unwrap();

        let second_current = conn.execute(
            "INSERT INTO clinical_note_versions
                 (medical_record_id, doctor_id, notes, version_number, is_current, created_at)
             VALUES (1, 'doctor-1', 'second', 2, 1, '2024-01-01 09:00:00+00:00')",
            [],
        );
        assert!(RecordError::from_write(second_current.unwrap_err()).is_conflict());

        let duplicate_number = conn.execute(
            "INSERT INTO clinical_note_versions
                 (medical_record_id, doctor_id, notes, version_number, is_current, created_at)
             VALUES (1, 'doctor-1', 'again', 1, 0, '2024-01-01 09:00:00+00:00')",
            [],
        );
        assert!(RecordError::from_write(duplicate_number.unwrap_err()).is_conflict());
    }
}
