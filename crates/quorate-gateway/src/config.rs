//! Gateway configuration

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use quorate_workflow::WorkflowConfig;
use serde::{Deserialize, Serialize};

/// Gateway service configuration
///
/// Layered lowest to highest: built-in defaults, an optional `quorate.toml`
/// (or any format `config` understands) in the working directory, then
/// `QUORATE_*` environment variables. Nested keys use a double underscore,
/// e.g. `QUORATE_WORKFLOW__APPROVAL_MODE=legacy`. A bare `PORT` wins over
/// everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    pub workflow: WorkflowConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            json_logs: false,
            workflow: WorkflowConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `.env`, files and environment
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_sources(File::with_name("quorate").required(false))
    }

    /// Defaults overlaid with `file` and the environment
    pub fn from_sources<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = Config::try_from(&Self::default()).context("encoding defaults")?;

        let mut cfg: Self = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix("QUORATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("reading configuration")?
            .try_deserialize()
            .context("decoding configuration")?;

        // Platform-assigned port takes priority
        if let Ok(port) = std::env::var("PORT") {
            cfg.port = port.parse().context("PORT is not a valid port number")?;
        }

        cfg.workflow.validate()?;
        Ok(cfg)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
