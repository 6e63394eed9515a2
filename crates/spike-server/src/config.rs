// `spike.toml`: server configuration file.
//
// Sections: [server], [options], [gateway], [database], [redis]. Options use
// the same camelCase keys as `SpikeOptions`. Environment variables override
// the file for the values that usually differ per deployment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

use spike_core::env;
use spike_core::options::SpikeOptions;
use spike_gateway::GatewayOptions;

pub const DEFAULT_CONFIG_FILE: &str = "spike.toml";

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub options: SpikeOptions,
    #[serde(default)]
    pub gateway: Option<GatewayOptions>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for browser clients on another origin.
    #[serde(default)]
    pub cors: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Memory,
    Mongodb,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_db_name")]
    pub name: String,
}

fn default_db_name() -> String { "spike".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            uri: None,
            name: default_db_name(),
        }
    }
}

/// Counter store for rate limiting; in-process when `url` is unset.
#[derive(Debug, Default, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Values taken from the environment, applied over the file.
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub secret: Option<String>,
    pub base_url: Option<String>,
    pub mongodb_uri: Option<String>,
    pub redis_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            secret: env::get_secret_from_env(),
            base_url: env::get_url_from_env(),
            mongodb_uri: env::get_mongodb_uri_from_env(),
            redis_url: env::get_redis_url_from_env(),
        }
    }
}

impl ServerConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read `path`, or `spike.toml` in the working directory when present,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        let mut config = match &file {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("cannot read {}", p.display()))?;
                Self::parse(&text).with_context(|| format!("in {}", p.display()))?
            }
            None => Self::default(),
        };
        config.apply(EnvOverrides::from_env());
        Ok(config)
    }

    pub fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(secret) = overrides.secret {
            self.options.secret = secret;
        }
        if let Some(url) = overrides.base_url {
            self.options.base_url = Some(url);
        }
        if let Some(uri) = overrides.mongodb_uri {
            self.database.backend = DatabaseBackend::Mongodb;
            self.database.uri = Some(uri);
        }
        if let Some(url) = overrides.redis_url {
            self.redis.url = Some(url);
        }
    }

    /// Everything `serve` needs before it touches the network.
    pub fn validate(&self, production: bool) -> anyhow::Result<()> {
        self.options.validate(production)?;
        match &self.gateway {
            Some(gateway) => gateway.validate()?,
            None => bail!("[gateway] section is required"),
        }
        if self.database.backend == DatabaseBackend::Mongodb && self.database.uri.is_none() {
            bail!("database.uri is required for the mongodb backend");
        }
        Ok(())
    }
}
