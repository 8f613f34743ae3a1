//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod serve;
pub mod status;

pub use admin::run_admin;
pub use config::run_config;
pub use serve::run_serve;
pub use status::run_status;

use anyhow::Context;
use reservo_core::Config;
use reservo_gateway::JwtManager;

use crate::ui;

/// Load configuration from the default path plus environment overrides.
fn load_config() -> anyhow::Result<Config> {
    Config::load_default().with_context(|| {
        format!(
            "Failed to load configuration from {}",
            Config::default_path().display()
        )
    })
}

/// Print a fresh pair of signing secrets as environment assignments.
pub fn run_secret() {
    ui::header("Token signing secrets");
    println!(
        "RESERVO_JWT_SECRET={}",
        JwtManager::generate_hex_secret()
    );
    println!(
        "RESERVO_JWT_REFRESH_SECRET={}",
        JwtManager::generate_hex_secret()
    );
    println!();
    ui::info("Keep both values private; they must differ.");
}
