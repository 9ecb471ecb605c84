//! Configuration for the docsync CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `docsync_core::{EngineConfig, IdentityConfig}`.
//! Core never reads files; everything it needs passes through here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docsync_api::AuthPaths;
use docsync_core::{Credentials, EngineConfig, IdentityConfig, RouteConfig};

/// Prefix for configuration overrides from the environment.
pub const ENV_PREFIX: &str = "DOCSYNC_";
/// Username fallback when a profile names none.
pub const USERNAME_ENV: &str = "DOCSYNC_USERNAME";
/// Password fallback when the profile's own variable is unset.
pub const PASSWORD_ENV: &str = "DOCSYNC_PASSWORD";
/// Keyring service name.
const KEYRING_SERVICE: &str = "docsync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub log: LogSettings,

    /// Post-auth navigation targets.
    #[serde(default)]
    pub routes: Routes,

    /// Named identity-provider profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            log: LogSettings::default(),
            routes: Routes::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_command_channel_size")]
    pub command_channel_size: usize,

    #[serde(default = "default_notice_channel_size")]
    pub notice_channel_size: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            command_channel_size: default_command_channel_size(),
            notice_channel_size: default_notice_channel_size(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_command_channel_size() -> usize {
    64
}
fn default_notice_channel_size() -> usize {
    32
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Baseline filter directive when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Routes {
    #[serde(default = "default_after_login")]
    pub after_login: String,

    #[serde(default = "default_after_logout")]
    pub after_logout: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            after_login: default_after_login(),
            after_logout: default_after_logout(),
        }
    }
}

fn default_after_login() -> String {
    "/dashboard".into()
}
fn default_after_logout() -> String {
    "/login".into()
}

/// A named identity-provider profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Identity endpoint base URL (e.g., "https://auth.example.com").
    pub url: String,

    /// Sign-in path, relative to `url`.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Sign-out path, relative to `url`.
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    pub username: Option<String>,

    /// Password in plaintext. Prefer the keyring or `password_env`.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_login_path() -> String {
    AuthPaths::default().login
}
fn default_logout_path() -> String {
    AuthPaths::default().logout
}

impl Config {
    /// The profile named `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Engine tuning and routes, validated.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        for (field, value) in [
            ("defaults.command_channel_size", self.defaults.command_channel_size),
            ("defaults.notice_channel_size", self.defaults.notice_channel_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        for (field, route) in [
            ("routes.after_login", &self.routes.after_login),
            ("routes.after_logout", &self.routes.after_logout),
        ] {
            if !route.starts_with('/') {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: format!("expected an absolute path, got '{route}'"),
                });
            }
        }

        Ok(EngineConfig {
            command_channel_size: self.defaults.command_channel_size,
            notice_channel_size: self.defaults.notice_channel_size,
            routes: RouteConfig {
                after_login: self.routes.after_login.clone(),
                after_logout: self.routes.after_logout.clone(),
            },
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "docsync", "docsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("docsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// A missing file is not an error; defaults and env vars still apply.
/// Nested keys use a double underscore: `DOCSYNC_LOG__LEVEL=debug`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve username and password for a profile.
///
/// Password order: the profile's `password_env` variable, then
/// `DOCSYNC_PASSWORD`, then the system keyring, then plaintext config.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = resolve_password(profile, profile_name).ok_or_else(|| {
        ConfigError::NoCredentials {
            profile: profile_name.into(),
        }
    })?;

    Ok(Credentials { username, password })
}

fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile
        .password_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Some(SecretString::from(pw));
    }

    // 2. Global env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.get_password())
        .ok()
    {
        return Some(SecretString::from(pw));
    }

    // 4. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Build an `IdentityConfig` from a profile.
pub fn profile_to_identity_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<IdentityConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    Ok(IdentityConfig {
        url,
        paths: AuthPaths {
            login: profile.login_path.clone(),
            logout: profile.logout_path.clone(),
        },
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    })
}
