//! Command-line surface (SPEC_FULL §12): `serve` and `validate`.

use clap::{Parser, Subcommand};
use yukie_domain::config::Config;

/// yukie-gateway — an LLM-driven request router and tool orchestrator.
#[derive(Debug, Parser)]
#[command(name = "yukie-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve {
        /// Path to the YAML configuration file.
        #[arg(long, default_value = "config.yaml")]
        config: String,
    },
    /// Load and validate the configuration file, printing any issues.
    Validate {
        #[arg(long, default_value = "config.yaml")]
        config: String,
    },
}

/// Loads `path`, falling back to defaults if the file is absent, then
/// overlays secrets that are never stored in the YAML file itself
/// (spec §6 Environment: `JWT_SECRET`).
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config = if std::path::Path::new(path).exists() {
        let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
        serde_yaml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))?
    } else {
        Config::default()
    };

    if let Ok(secret) = std::env::var("JWT_SECRET") {
        if !secret.trim().is_empty() {
            config.auth.jwt_secret = Some(secret);
        }
    }

    overlay_service_base_urls(&mut config);
    Ok(config)
}

/// `YUKIE_SERVICE_<ID>_BASE_URL` overrides a configured service's
/// `base_url` without editing the YAML file — useful for pointing a
/// staging gateway at a different backend instance.
fn overlay_service_base_urls(config: &mut Config) {
    for service in &mut config.services {
        let var_name = format!(
            "YUKIE_SERVICE_{}_BASE_URL",
            service.id.to_uppercase().replace(['-', '.'], "_")
        );
        if let Ok(base_url) = std::env::var(&var_name) {
            if !base_url.trim().is_empty() {
                tracing::info!(service_id = %service.id, "base_url overridden by {var_name}");
                service.base_url = base_url;
            }
        }
    }
}
