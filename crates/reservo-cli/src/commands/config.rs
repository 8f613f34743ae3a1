//! Config show/validate command.

use anyhow::Result;
use reservo_core::Config;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Validate the configuration and required secrets.
    Validate,
    /// Print the config file path.
    Path,
}

/// Run the config command.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or is invalid.
pub fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
            Ok(())
        }
        ConfigAction::Show => show_config(),
        ConfigAction::Validate => validate_config(),
    }
}

fn set_or_missing(present: bool) -> &'static str {
    if present { "set" } else { "missing" }
}

fn show_config() -> Result<()> {
    let path = Config::default_path();
    let config = super::load_config()?;

    ui::header("Configuration");
    ui::kv(
        "File",
        &if path.exists() {
            path.display().to_string()
        } else {
            format!("{} (not found, using defaults)", path.display())
        },
    );
    ui::kv("Data directory", &config.data_dir().display().to_string());
    ui::kv(
        "Database URL",
        set_or_missing(config.database.url.is_some()),
    );
    ui::kv(
        "JWT secret",
        set_or_missing(config.auth.jwt_secret.is_some()),
    );
    ui::kv(
        "JWT refresh secret",
        set_or_missing(config.auth.jwt_refresh_secret.is_some()),
    );
    println!();

    // Secrets are never serialized
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn validate_config() -> Result<()> {
    let config = match Config::load_default() {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("Invalid configuration: {e}"));
            return Err(e.into());
        }
    };

    if let Err(e) = config.require_secrets() {
        ui::error(&e.to_string());
        ui::info("Generate secrets with: reservo secret");
        return Err(e.into());
    }

    ui::success("Configuration is valid");
    Ok(())
}

