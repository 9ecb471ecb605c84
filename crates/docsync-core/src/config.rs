// ── Runtime engine configuration ──
//
// These types describe how the sync engine and session glue behave.
// They carry credential data and tuning, but never touch disk.
// The CLI constructs them from its config file and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use docsync_api::AuthPaths;

/// Where the session glue navigates after auth transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub after_login: String,
    pub after_logout: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            after_login: "/dashboard".into(),
            after_logout: "/login".into(),
        }
    }
}

/// Tuning for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Capacity of the command channel into the engine task.
    pub command_channel_size: usize,
    /// Capacity of the notice broadcast channel.
    pub notice_channel_size: usize,
    pub routes: RouteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 64,
            notice_channel_size: 32,
            routes: RouteConfig::default(),
        }
    }
}

/// Where and how to reach the identity provider.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Base URL of the identity endpoint (e.g., `https://auth.example.com`).
    pub url: Url,
    pub paths: AuthPaths,
    pub timeout: Duration,
}

/// A username and password for sign-in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}
