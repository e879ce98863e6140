//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core services as
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables.

use crate::constants::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE_PATH};
use crate::{RecordError, RecordResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Who may commit a new clinical note version to a medical record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AmendmentPolicy {
    /// Any caller with the doctor capability.
    #[default]
    AnyDoctor,
    /// Only the doctor the medical record is assigned to.
    AssignedDoctor,
}

impl fmt::Display for AmendmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyDoctor => f.write_str("any-doctor"),
            Self::AssignedDoctor => f.write_str("assigned-doctor"),
        }
    }
}

impl FromStr for AmendmentPolicy {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any-doctor" | "any_doctor" => Ok(Self::AnyDoctor),
            "assigned-doctor" | "assigned_doctor" => Ok(Self::AssignedDoctor),
            other => Err(RecordError::InvalidInput(format!(
                "unknown note amendment policy '{other}' (expected any-doctor or assigned-doctor)"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    busy_timeout: Duration,
    amendment_policy: AmendmentPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidInput`] if the database path is empty or the busy timeout
    /// is zero. A zero timeout would turn every contended write into an immediate conflict.
    pub fn new(
        database_path: PathBuf,
        busy_timeout: Duration,
        amendment_policy: AmendmentPolicy,
    ) -> RecordResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(RecordError::InvalidInput(
                "database path cannot be empty".into(),
            ));
        }
        if busy_timeout.is_zero() {
            return Err(RecordError::InvalidInput(
                "busy timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_path,
            busy_timeout,
            amendment_policy,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn amendment_policy(&self) -> AmendmentPolicy {
        self.amendment_policy
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the database path from an optional string value, falling back to
/// [`DEFAULT_DATABASE_PATH`].
pub fn database_path_from_env_value(value: Option<String>) -> PathBuf {
    PathBuf::from(non_blank(value).unwrap_or_else(|| DEFAULT_DATABASE_PATH.into()))
}

/// Parse the writer busy timeout (milliseconds) from an optional string value.
pub fn busy_timeout_from_env_value(value: Option<String>) -> RecordResult<Duration> {
    let millis = match non_blank(value) {
        Some(v) => v.parse::<u64>().map_err(|_| {
            RecordError::InvalidInput(format!("busy timeout must be a whole number of ms: {v}"))
        })?,
        None => DEFAULT_BUSY_TIMEOUT_MS,
    };
    Ok(Duration::from_millis(millis))
}

/// Parse the note amendment policy from an optional string value.
///
/// If `value` is `None` or blank, returns [`AmendmentPolicy::AnyDoctor`].
pub fn amendment_policy_from_env_value(value: Option<String>) -> RecordResult<AmendmentPolicy> {
    non_blank(value)
        .map(|v| v.parse::<AmendmentPolicy>())
        .transpose()
        .map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_database_path() {
        let result = CoreConfig::new(
            PathBuf::new(),
            Duration::from_secs(1),
            AmendmentPolicy::AnyDoctor,
        );
        assert!(matches!(result, Err(RecordError::InvalidInput(_))));
    }

    #[test]
    fn rejects_zero_busy_timeout() {
        let result = CoreConfig::new(
            PathBuf::from("hms.db"),
            Duration::ZERO,
            AmendmentPolicy::AnyDoctor,
        );
        assert!(matches!(result, Err(RecordError::InvalidInput(_))));
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        assert_eq!(
            database_path_from_env_value(Some("  ".into())),
            PathBuf::from(DEFAULT_DATABASE_PATH)
        );
        assert_eq!(
            busy_timeout_from_env_value(None).unwrap(),
            Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS)
        );
        assert_eq!(
            amendment_policy_from_env_value(None).unwrap(),
            AmendmentPolicy::AnyDoctor
        );
    }

    #[test]
    fn parses_amendment_policy() {
        assert_eq!(
            amendment_policy_from_env_value(Some("Assigned-Doctor".into())).unwrap(),
            AmendmentPolicy::AssignedDoctor
        );
        assert!(amendment_policy_from_env_value(Some("everyone".into())).is_err());
    }

    #[test]
    fn rejects_non_numeric_busy_timeout() {
        assert!(busy_timeout_from_env_value(Some("soon".into())).is_err());
        assert_eq!(
            busy_timeout_from_env_value(Some("250".into())).unwrap(),
            Duration::from_millis(250)
        );
    }
}
