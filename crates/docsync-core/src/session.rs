// ── Auth session glue ──
//
// Wraps an identity provider. Success moves the router; failure is
// published as a notice and returned as `CoreError::Auth`.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};

use docsync_api::{HttpIdentityProvider, IdentityProvider};

use crate::config::{Credentials, IdentityConfig};
use crate::engine::SyncEngine;
use crate::error::CoreError;
use crate::notice::Notice;

/// Sign-in and sign-out for one engine.
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    engine: SyncEngine,
}

impl Session {
    pub fn new(provider: Arc<dyn IdentityProvider>, engine: SyncEngine) -> Self {
        Self { provider, engine }
    }

    /// Build a session around an [`HttpIdentityProvider`].
    pub fn from_config(config: &IdentityConfig, engine: SyncEngine) -> Result<Self, CoreError> {
        let provider = HttpIdentityProvider::new(
            config.url.clone(),
            config.paths.clone(),
            config.timeout,
        )
        .map_err(|e| CoreError::Config {
            message: format!("cannot build identity client: {e}"),
        })?;
        Ok(Self::new(Arc::new(provider), engine))
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Sign in, then navigate to the post-login route.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), CoreError> {
        self.sign_in(&credentials.username, &credentials.password)
            .await
    }

    pub async fn sign_in(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        if let Err(e) = self.provider.sign_in(username, password).await {
            return Err(self.auth_failed(e));
        }

        info!(username, "signed in");
        let route = &self.engine.config().routes.after_login;
        self.engine.navigator().push(route);
        Ok(())
    }

    /// Sign out, tear the engine's cache down, and navigate to the
    /// post-logout route.
    pub async fn logout(&self) -> Result<(), CoreError> {
        if let Err(e) = self.provider.sign_out().await {
            return Err(self.auth_failed(e));
        }

        self.engine.teardown().await?;
        info!("signed out");
        let route = &self.engine.config().routes.after_logout;
        self.engine.navigator().push(route);
        Ok(())
    }

    fn auth_failed(&self, source: docsync_api::Error) -> CoreError {
        let message = match source {
            docsync_api::Error::Authentication { message } => message,
            other => other.to_string(),
        };
        warn!(%message, "authentication failed");
        self.engine.publish(Notice::AuthFailed {
            message: message.clone(),
        });
        CoreError::Auth { message }
    }
}
