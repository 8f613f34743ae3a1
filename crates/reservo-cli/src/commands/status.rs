//! Status command - probe a running server's health endpoint.

use std::time::Duration;

use anyhow::Result;
use reservo_core::Config;

use crate::ui::{self, HealthStatus};

/// Probe `/health` on the local server.
///
/// # Errors
///
/// Returns error only if the HTTP client cannot be built.
pub async fn run_status(port: Option<u16>) -> Result<()> {
    ui::header("Reservo Status");

    let config = Config::load_default().unwrap_or_default();
    let port = port.unwrap_or(config.server.port);
    let url = format!("http://127.0.0.1:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            ui::health_check("API", HealthStatus::Ok, Some(&url));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(backend) = body.get("backend").and_then(|v| v.as_str()) {
                    ui::kv("Backend", backend);
                }
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("Version", version);
                }
            }
        }
        Ok(resp) => {
            ui::health_check(
                "API",
                HealthStatus::Warning,
                Some(&format!("health returned {}", resp.status())),
            );
        }
        Err(_) => {
            ui::health_check("API", HealthStatus::Error, Some("not reachable"));
            ui::info("Start with: reservo serve");
        }
    }

    Ok(())
}
