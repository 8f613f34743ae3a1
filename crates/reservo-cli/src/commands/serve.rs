//! Serve command - run the API server.

use anyhow::Result;
use reservo_core::BackendKind;
use reservo_gateway::Gateway;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
}

/// Start the API server and block until ctrl-c.
///
/// # Errors
///
/// Returns error if configuration is invalid, secrets are missing, or the
/// server fails.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    config.validate()?;

    ui::header("Starting Reservo API");
    ui::kv(
        "Address",
        &format!("{}:{}", config.server.bind_address, config.server.port),
    );
    ui::kv("Environment", &config.server.environment.to_string());

    let gateway = Gateway::from_config(&config).await?;
    let backend = gateway.state().storage.kind();
    ui::kv("Backend", backend.as_str());
    if config.database.url.is_some() && backend == BackendKind::Document {
        ui::warning("PostgreSQL was unreachable; running on the document store");
    }
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    gateway.run().await?;
    Ok(())
}
