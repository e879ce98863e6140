use crate::dto::HealthRes;
use hms_core::{database_state, CoreConfig};

/// Health service shared by the API binaries.
///
/// Reports whether the service is alive and how far the database schema has been provisioned.
pub struct HealthService;

impl HealthService {
    /// Checks database reachability and provisioning.
    ///
    /// `ok` is false when the database cannot be opened; a partially provisioned schema is still
    /// reported as alive because reads degrade gracefully.
    pub fn check_health(cfg: &CoreConfig) -> HealthRes {
        match database_state(cfg) {
            Ok(state) => HealthRes {
                ok: true,
                message: "HMS is alive".into(),
                schema: state.as_str().into(),
            },
            Err(e) => {
                tracing::error!("health check could not open database: {}", e);
                HealthRes {
                    ok: false,
                    message: "database unavailable".into(),
                    schema: "unknown".into(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_core::{provision_database, AmendmentPolicy};
    use std::time::Duration;
    use tempfile::TempDir;

    fn cfg(dir: &TempDir) -> CoreConfig {
        CoreConfig::new(
            dir.path().join("hms.db"),
            Duration::from_secs(1),
            AmendmentPolicy::AnyDoctor,
        )
        .unwrap()
    }

    #[test]
    fn reports_missing_database() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let res = HealthService::check_health(&cfg(&dir));
        assert!(!res.ok);
        assert_eq!(res.schema, "unknown");
    }

    #[test]
    fn reports_provisioned_schema() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = cfg(&dir);
        provision_database(&cfg).unwrap();

        let res = HealthService::check_health(&cfg);
        assert!(res.ok);
        assert_eq!(res.schema, "complete");
    }
}
