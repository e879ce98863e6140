use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use hms_core::config::{
    amendment_policy_from_env_value, busy_timeout_from_env_value, database_path_from_env_value,
};
use hms_core::{CoreConfig, database_state, provision_database};

/// Main entry point for the HMS medical records service
///
/// Resolves configuration once, optionally provisions the database, and serves the REST API.
///
/// # Environment Variables
/// - `HMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HMS_DATABASE_PATH`: SQLite database file (default: "hms.db")
/// - `HMS_BUSY_TIMEOUT_MS`: how long a writer waits for the database lock (default: 5000)
/// - `HMS_NOTE_AMENDMENT_POLICY`: `any-doctor` (default) or `assigned-doctor`
/// - `HMS_AUTO_PROVISION`: when `true`, create or upgrade the schema at startup
/// - `API_KEY`: shared secret the gateway sends in `x-api-key` (required)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hms_run=info".parse()?)
                .add_directive("hms_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_key = std::env::var("API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("API_KEY must be set"))?;

    let cfg = Arc::new(CoreConfig::new(
        database_path_from_env_value(std::env::var("HMS_DATABASE_PATH").ok()),
        busy_timeout_from_env_value(std::env::var("HMS_BUSY_TIMEOUT_MS").ok())?,
        amendment_policy_from_env_value(std::env::var("HMS_NOTE_AMENDMENT_POLICY").ok())?,
    )?);

    let auto_provision = std::env::var("HMS_AUTO_PROVISION")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if auto_provision {
        let state = provision_database(&cfg)?;
        tracing::info!("++ Database provisioned ({})", state.as_str());
    } else {
        match database_state(&cfg) {
            Ok(state) => tracing::info!("++ Database schema: {}", state.as_str()),
            Err(e) => tracing::warn!("++ Database not reachable yet: {}", e),
        }
    }

    let rest_addr = std::env::var("HMS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting HMS REST on {}", rest_addr);
    tracing::info!(
        "++ Clinical note amendment policy: {}",
        cfg.amendment_policy()
    );

    let app = router(AppState::new(cfg, api_key));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
