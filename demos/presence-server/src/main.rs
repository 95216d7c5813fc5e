//! Standalone presence server: JWT authentication, in-memory sessions.
//!
//! Configuration comes from the environment (a `.env` file is loaded if
//! present):
//!
//! - `JWT_SECRET` (required), `JWT_ISSUER`
//! - `TUNEQUEUE_BIND`, `TUNEQUEUE_HANDSHAKE_TIMEOUT_SECS`, `TUNEQUEUE_IDLE_TIMEOUT_SECS`
//! - `TUNEQUEUE_DEMO_USERS`: comma-separated user ids that may connect
//! - `TUNEQUEUE_DEMO_SESSION`: name of a session to create at startup,
//!   hosted by the first demo user
//! - `RUST_LOG`: log filter, `info` by default

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tunequeue::prelude::*;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

type DemoServer =
    TunequeueServer<JwtAuthenticator<InMemoryUserDirectory>, InMemorySessionStore, JsonCodec>;

/// Parses `TUNEQUEUE_DEMO_USERS`. Entries may be `id` or `id:username`.
fn parse_users(raw: &str) -> Vec<UserIdentity> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((id, name)) if !name.is_empty() => UserIdentity::new(id).with_username(name),
            Some((id, _)) => UserIdentity::new(id),
            None => UserIdentity::new(entry),
        })
        .collect()
}

async fn build_server(
    config: ServerConfig,
    jwt: JwtConfig,
    users: Vec<UserIdentity>,
    demo_session: Option<String>,
) -> Result<DemoServer, BoxError> {
    let store = Arc::new(InMemorySessionStore::new());

    if let (Some(name), Some(host)) = (demo_session, users.first()) {
        let session = store.create_session(host.id().clone(), name).await?;
        tracing::info!(
            session_code = %session.session_code,
            host_id = %session.host_id,
            "demo session ready"
        );
    }

    tracing::info!(users = users.len(), "user directory loaded");
    let auth = JwtAuthenticator::new(jwt, InMemoryUserDirectory::with_users(users));

    let server = TunequeueServerBuilder::from_config(config)
        .build(auth, store)
        .await?;
    Ok(server)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let jwt = JwtConfig::from_env().ok_or("JWT_SECRET must be set")?;
    let users = parse_users(&std::env::var("TUNEQUEUE_DEMO_USERS").unwrap_or_default());
    let demo_session = std::env::var("TUNEQUEUE_DEMO_SESSION")
        .ok()
        .filter(|name| !name.trim().is_empty());

    tracing::info!(bind = %config.bind_addr, ?jwt, "starting presence server");
    let server = build_server(config, jwt, users, demo_session).await?;
    server.run().await?;
    Ok(())
}
