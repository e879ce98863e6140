//! SQLite storage for medical records and their clinical note versions.
//!
//! Every function in the submodules takes a borrowed [`Connection`], so callers decide the
//! transaction scope. A [`rusqlite::Transaction`] derefs to a connection and can be passed
//! anywhere a connection is expected.

pub mod doctors;
pub mod records;
pub mod schema;
pub mod versions;

use crate::config::CoreConfig;
use crate::{RecordError, RecordResult};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Opens a read-write connection to an existing database.
///
/// The file is never created here: a missing database is a deployment problem and is reported as
/// [`RecordError::StorageUnavailable`] rather than papered over with an empty file.
pub fn open_connection(cfg: &CoreConfig) -> RecordResult<Connection> {
    let path = cfg.database_path();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unavailable(path, e))?;

    configure(&conn, cfg)?;
    Ok(conn)
}

/// Opens the database, creating the file if needed. Only provisioning should call this.
pub fn open_or_create(cfg: &CoreConfig) -> RecordResult<Connection> {
    let path = cfg.database_path();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unavailable(path, e))?;

    configure(&conn, cfg)?;
    Ok(conn)
}

fn configure(conn: &Connection, cfg: &CoreConfig) -> RecordResult<()> {
    conn.busy_timeout(cfg.busy_timeout())?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn unavailable(path: &Path, err: rusqlite::Error) -> RecordError {
    RecordError::StorageUnavailable(format!(
        "cannot open database {}: {err}",
        path.display()
    ))
}
