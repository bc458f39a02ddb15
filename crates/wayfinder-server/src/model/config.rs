//! Configuration management for Wayfinder server
//!
//! Sources, lowest precedence first: the YAML file, `WAYFINDER_*` environment
//! variables (`__` separates nested keys), then command line flags.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use wayfinder_registry::RegistryConfig;

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 8500;

const SERVER_ADDRESS_PROPERTY: &str = "server.address";
const SERVER_PORT_PROPERTY: &str = "server.port";
const REGISTRY_SECTION: &str = "registry";
const REGISTRY_BACKEND_PROPERTY: &str = "registry.backend";

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "wayfinder-server", version, about = "Service registry and discovery server")]
pub struct Cli {
    /// Path of the YAML configuration file
    #[arg(short = 'c', long = "config", env = "WAYFINDER_CONFIG")]
    pub config: Option<String>,
    /// HTTP listen port
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Registry backend: memory or redis
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration using the process arguments
    pub fn new() -> anyhow::Result<Self> {
        Self::load(&Cli::parse())
    }

    pub fn load(args: &Cli) -> anyhow::Result<Self> {
        let file = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);

        let mut config_builder = Config::builder()
            .add_source(File::with_name(file).required(args.config.is_some()))
            .add_source(
                Environment::with_prefix("WAYFINDER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(port) = args.port {
            config_builder = config_builder.set_override(SERVER_PORT_PROPERTY, port as i64)?;
        }
        if let Some(backend) = &args.backend {
            config_builder = config_builder.set_override(REGISTRY_BACKEND_PROPERTY, backend.as_str())?;
        }

        let config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build configuration from {}: {}", file, e))?;

        Ok(Configuration { config })
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS_PROPERTY)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT_PROPERTY)
            .ok()
            .and_then(|port| u16::try_from(port).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    // ========================================================================
    // Registry Configuration
    // ========================================================================

    /// The `registry` section; defaults apply when it is absent
    pub fn registry_config(&self) -> anyhow::Result<RegistryConfig> {
        match self.config.get::<RegistryConfig>(REGISTRY_SECTION) {
            Ok(registry) => Ok(registry),
            Err(ConfigError::NotFound(_)) => Ok(RegistryConfig::default()),
            Err(e) => Err(anyhow::anyhow!("invalid registry configuration: {}", e)),
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string("logging.dir").ok(),
            self.config.get_bool("logging.console").unwrap_or(true),
            self.config.get_bool("logging.file").unwrap_or(false),
            self.config
                .get_string("logging.level")
                .unwrap_or("info".to_string()),
        )
        .with_env_overrides()
    }
}
