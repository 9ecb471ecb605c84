//! Config subcommand handlers.

use std::io::{self, BufRead};

use docsync_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::config_file;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

pub fn handle(args: &ConfigArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => output::print_output(&format_config_redacted(config)?),
        ConfigCommand::Path => output::print_output(&config_file(global).display().to_string()),
        ConfigCommand::Profiles => output::print_output(&format_profiles(config)),
        ConfigCommand::SetPassword => set_password(config, global),
    }
}

/// Effective config as TOML with plaintext passwords masked.
fn format_config_redacted(config: &Config) -> Result<String, CliError> {
    let mut redacted = config.clone();
    for profile in redacted.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    toml::to_string_pretty(&redacted).map_err(|e| CliError::Config {
        message: format!("cannot render config: {e}"),
    })
}

/// Profile names, sorted, with the default marked `*`.
fn format_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let marker = if config.default_profile.as_deref() == Some(name.as_str()) {
                '*'
            } else {
                ' '
            };
            format!("{marker} {name}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn set_password(config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let (name, _) = config.profile(global.profile.as_deref())?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "expected a password on stdin".into(),
        });
    }

    docsync_config::store_password(name, password)?;
    tracing::info!(profile = name, "password stored in keyring");
    output::print_output(&format!("Password stored in system keyring for profile '{name}'"))
}

#[cfg(test)]
mod tests {
    use docsync_config::Profile;

    use super::*;

    fn profile(password: Option<&str>) -> Profile {
        Profile {
            url: "https://auth.example.com".into(),
            login_path: "/auth/login".into(),
            logout_path: "/auth/logout".into(),
            username: Some("ada".into()),
            password: password.map(Into::into),
            password_env: None,
            timeout: None,
        }
    }

    #[test]
    fn show_masks_plaintext_passwords() {
        let mut config = Config::default();
        config
            .profiles
            .insert("default".into(), profile(Some("hunter2")));
        config.profiles.insert("work".into(), profile(None));

        let text = format_config_redacted(&config).unwrap_or_default();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("password = \"****\""));
        assert!(text.contains("[profiles.work]"));
        assert!(text.contains("after_login = \"/dashboard\""));
    }

    #[test]
    fn profiles_are_sorted_with_default_marked() {
        let mut config = Config::default();
        config.profiles.insert("work".into(), profile(None));
        config.profiles.insert("default".into(), profile(None));

        assert_eq!(format_profiles(&config), "* default\n  work");
    }
}
