// Identity provider
//
// Username/password sign-in and sign-out against an HTTP identity
// endpoint. The login endpoint sets a session cookie in the client's
// jar; the logout endpoint invalidates it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Signs a user in and out of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn sign_in(&self, username: &str, password: &SecretString) -> Result<(), Error>;

    async fn sign_out(&self) -> Result<(), Error>;
}

/// Endpoint paths for [`HttpIdentityProvider`], relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPaths {
    pub login: String,
    pub logout: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".into(),
            logout: "/auth/logout".into(),
        }
    }
}

/// Error body returned by the identity endpoint on failure.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`IdentityProvider`] speaking JSON over HTTP with a cookie session.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: Url,
    paths: AuthPaths,
}

impl HttpIdentityProvider {
    /// Build a provider with its own cookie-backed HTTP client.
    pub fn new(
        base_url: Url,
        paths: AuthPaths,
        timeout: std::time::Duration,
    ) -> Result<Self, Error> {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self::with_client(http, base_url, paths))
    }

    /// Build a provider around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, paths: AuthPaths) -> Self {
        Self {
            http,
            base_url,
            paths,
        }
    }

    /// Turn a non-success response into a user-facing message.
    async fn failure_message(resp: reqwest::Response) -> String {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
        {
            Some(message) => message,
            None if body.is_empty() => format!("HTTP {status}"),
            None => format!("HTTP {status}: {body}"),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.base_url.join(&self.paths.login)?;
        debug!("signing in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        if !resp.status().is_success() {
            return Err(Error::Authentication {
                message: Self::failure_message(resp).await,
            });
        }

        debug!("sign-in successful");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), Error> {
        let url = self.base_url.join(&self.paths.logout)?;
        debug!("signing out at {}", url);

        let resp = self
            .http
            .post(url)
            .send()
            .await
            .map_err(Error::Transport)?;

        if !resp.status().is_success() {
            return Err(Error::Authentication {
                message: Self::failure_message(resp).await,
            });
        }

        debug!("sign-out complete");
        Ok(())
    }
}
