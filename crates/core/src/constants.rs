//! Constants used throughout the HMS core crate.

/// Database file used when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "hms.db";

/// Default time a writer waits for the database write lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on a single clinical note, in bytes after trimming.
pub const MAX_NOTE_BYTES: usize = 64 * 1024;

/// Change reason recorded on version 1 when it is derived from a record's existing notes.
pub const INITIAL_NOTES_CHANGE_REASON: &str = "Initial notes";

/// How many times a note commit is re-attempted after a write conflict.
pub const COMMIT_CONFLICT_RETRIES: usize = 1;
