//! `chime-host`: run the notification engine for one principal.
//!
//! Loads `config.toml`, opens the principal's state file, wires the HTTP
//! backend, and runs the engine until Ctrl-C. The principal identity is
//! supplied by the session layer in the full dashboard; here it comes from
//! `CHIME_PRINCIPAL` (id) and `CHIME_ROLE` (`member` | `administrator`).

use chime::backend::HttpBackend;
use chime::sources::{Principal, PrincipalRole};
use chime::{Engine, EngineConfig, JsonFileStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("chime-host starting");

    let config = EngineConfig::load_or_default()?;
    let principal = principal_from_env();

    let store = Arc::new(JsonFileStore::open(chime::chime_dirs::state_file(
        &principal.id,
    ))?);
    let backend = HttpBackend::new(
        &config.backend,
        Duration::from_secs(config.poll.fetch_timeout_secs),
    )?;

    let engine = Engine::new(config, store, Arc::new(backend))?;
    engine.start(principal)?;

    tokio::signal::ctrl_c().await?;
    engine.stop();

    tracing::info!("chime-host shut down cleanly");
    Ok(())
}

fn principal_from_env() -> Principal {
    let id = std::env::var("CHIME_PRINCIPAL").unwrap_or_else(|_| "local".to_owned());
    let role = match std::env::var("CHIME_ROLE").as_deref() {
        Ok("administrator") => PrincipalRole::Administrator,
        _ => PrincipalRole::Member,
    };
    Principal {
        display_name: id.clone(),
        id,
        role,
    }
}
