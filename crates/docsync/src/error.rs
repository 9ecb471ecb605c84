//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use docsync_config::ConfigError;
use docsync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REMOTE: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(docsync::auth_failed),
        help("Check the username and password for this profile.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(docsync::no_credentials),
        help(
            "Set a username in the profile or DOCSYNC_USERNAME, then a password via\n\
             DOCSYNC_PASSWORD or: docsync config set-password --profile {profile}"
        )
    )]
    NoCredentials { profile: String },

    // ── Documents ────────────────────────────────────────────────────
    #[error("Entity {key} no longer exists")]
    #[diagnostic(
        code(docsync::entity_gone),
        help("It was probably deleted by someone else while it was open.")
    )]
    EntityGone { key: String },

    #[error("{message}")]
    #[diagnostic(code(docsync::remote))]
    Remote { message: String },

    #[error("Sync engine stopped before the command completed")]
    #[diagnostic(code(docsync::engine_stopped))]
    EngineStopped,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(docsync::profile_not_found),
        help("List profiles with: docsync config profiles")
    )]
    ProfileNotFound { name: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(docsync::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(docsync::config),
        help("Inspect the effective configuration with: docsync config show")
    )]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render output: {0}")]
    #[diagnostic(code(docsync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::EntityGone { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Remote { .. } => exit_code::REMOTE,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::EngineStopped | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Auth { message } => Self::AuthFailed { message },
            CoreError::EntityGone { key } => Self::EntityGone {
                key: key.to_string(),
            },
            CoreError::EngineStopped => Self::EngineStopped,
            CoreError::Config { message } => Self::Config { message },
            remote @ (CoreError::RemoteWrite { .. } | CoreError::RemoteRead { .. }) => {
                Self::Remote {
                    message: remote.to_string(),
                }
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound { name: profile },
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use docsync_core::DocumentKey;

    use super::*;

    #[test]
    fn auth_failures_exit_with_auth_code() {
        let err = CliError::from(CoreError::Auth {
            message: "The password is invalid.".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
        assert_eq!(
            err.to_string(),
            "Authentication failed: The password is invalid."
        );
    }

    #[test]
    fn entity_gone_keeps_the_key() {
        let err = CliError::from(CoreError::EntityGone {
            key: DocumentKey::new("Parent", "P1"),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("Parent/P1"));
    }

    #[test]
    fn config_errors_are_usage_errors() {
        let err = CliError::from(ConfigError::Validation {
            field: "routes.after_login".into(),
            reason: "expected an absolute path".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);

        let err = CliError::from(ConfigError::UnknownProfile {
            profile: "work".into(),
        });
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "work"));
    }
}
