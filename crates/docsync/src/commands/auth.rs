//! Login and logout against a profile's identity endpoint.
//!
//! The binary has no remote document backend of its own, so the session
//! runs over an in-memory mirror. What matters here is the auth round
//! trip and where the router ends up.

use std::sync::Arc;

use serde::Serialize;

use docsync_api::MemoryStore;
use docsync_config::{Config, Profile};
use docsync_core::{CoreError, DocumentStore, MemoryNavigator, Navigator, Session, SyncEngine};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct AuthOutcome<'a> {
    profile: &'a str,
    route: String,
}

pub async fn login(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (name, profile) = config.profile(global.profile.as_deref())?;
    let credentials = docsync_config::resolve_credentials(profile, name)?;
    let session = session(config, profile, &config.routes.after_logout)?;

    let result = session.login(&credentials).await;
    let route = finish(&session, result).await?;
    output::print_output(&output::render_json(global, &AuthOutcome { profile: name, route })?)
}

pub async fn logout(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (name, profile) = config.profile(global.profile.as_deref())?;
    let session = session(config, profile, &config.routes.after_login)?;

    let result = session.logout().await;
    let route = finish(&session, result).await?;
    output::print_output(&output::render_json(global, &AuthOutcome { profile: name, route })?)
}

fn session(config: &Config, profile: &Profile, start: &str) -> Result<Session, CliError> {
    let identity = docsync_config::profile_to_identity_config(profile, &config.defaults)?;
    let engine = SyncEngine::start(
        config.engine_config()?,
        Arc::new(MemoryStore::new()) as Arc<dyn DocumentStore>,
        Arc::new(MemoryNavigator::new(start)) as Arc<dyn Navigator>,
    );
    Ok(Session::from_config(&identity, engine)?)
}

/// Stop the engine and report where navigation ended up.
async fn finish(session: &Session, result: Result<(), CoreError>) -> Result<String, CliError> {
    let route = session.engine().navigator().current_path();
    session.engine().shutdown().await;
    result?;
    Ok(route)
}
