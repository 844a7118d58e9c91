//! Provider configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. YAML file (`--config`)
//! 3. Environment (`MAGIKLINK_*`)
//! 4. Command-line flags
//!
//! ```yaml
//! data_root: /var/lib/magiklink
//! bind_address: 0.0.0.0:4000
//! docker_host: unix:///var/run/docker.sock
//! provision_all_containers: false
//! verbose_logging: true
//! ```

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_DATA_ROOT};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_DATA_ROOT: &str = "MAGIKLINK_DATA_ROOT";
pub const ENV_BIND_ADDRESS: &str = "MAGIKLINK_BIND_ADDRESS";
pub const ENV_DOCKER_HOST: &str = "MAGIKLINK_DOCKER_HOST";
pub const ENV_PROVISION_ALL: &str = "MAGIKLINK_PROVISION_ALL";
pub const ENV_VERBOSE: &str = "MAGIKLINK_VERBOSE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Directory materialized volumes are written under.
    pub data_root: PathBuf,
    /// Listen address of the HTTP sidecar.
    pub bind_address: String,
    /// Docker endpoint; local defaults when unset.
    pub docker_host: Option<String>,
    /// Provision every container of a pod instead of only the first.
    pub provision_all_containers: bool,
    pub verbose_logging: bool,
    pub errors_only_logging: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            docker_host: None,
            provision_all_containers: false,
            verbose_logging: false,
            errors_only_logging: false,
        }
    }
}

impl ProviderConfig {
    /// Parses a YAML document. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&yaml)
    }

    /// Applies `MAGIKLINK_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup(ENV_DATA_ROOT) {
            self.data_root = PathBuf::from(root);
        }
        if let Some(addr) = lookup(ENV_BIND_ADDRESS) {
            self.bind_address = addr;
        }
        if let Some(host) = lookup(ENV_DOCKER_HOST) {
            self.docker_host = (!host.is_empty()).then_some(host);
        }
        if let Some(flag) = lookup(ENV_PROVISION_ALL) {
            self.provision_all_containers = parse_flag(ENV_PROVISION_ALL, &flag)?;
        }
        if let Some(flag) = lookup(ENV_VERBOSE) {
            self.verbose_logging = parse_flag(ENV_VERBOSE, &flag)?;
        }
        Ok(())
    }

    /// Checks the settings are usable.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.verbose_logging && self.errors_only_logging {
            return Err(Error::Config(
                "verbose_logging and errors_only_logging are mutually exclusive".to_string(),
            ));
        }

        if self.data_root.as_os_str().is_empty() {
            return Err(Error::Config("data_root cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            Error::Config(format!("invalid bind_address '{}': {e}", self.bind_address))
        })
    }

    /// Default log directive when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose_logging {
            "debug"
        } else if self.errors_only_logging {
            "error"
        } else {
            "info"
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("{key}: '{other}' is not a boolean"))),
    }
}
