//! Configuration management

use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sqs: SqsConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SqsConfig {
    /// Public base URL for queue URLs; defaults to `http://localhost:{port}`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Accounts whose queues may be addressed
    #[serde(default = "default_accounts")]
    pub accounts: Vec<String>,

    /// Expose internal failure causes in error responses
    #[serde(default)]
    pub privileged: bool,

    /// Limit overrides keyed by setting name, e.g. `max_maximum_message_size`
    #[serde(default)]
    pub limits: HashMap<String, String>,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            accounts: default_accounts(),
            privileged: false,
            limits: HashMap::new(),
        }
    }
}

fn default_port() -> u16 {
    4566
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_accounts() -> Vec<String> {
    vec!["000000000000".to_string()]
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Environment keys nest with `__`, e.g. `QUEUESTACK_SQS__REGION`.
    pub fn load(file: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("QUEUESTACK").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }
}
