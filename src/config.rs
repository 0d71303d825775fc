//! Server Configuration
//!
//! Defaults for both servers, overridable through environment variables. Command line
//! flags handled by the binary take precedence over both.
//!
//! | Variable                | Server  | Default          |
//! |-------------------------|---------|------------------|
//! | `DFS_SERVICE_ADDR`      | naming  | `0.0.0.0:6000`   |
//! | `DFS_REGISTRATION_ADDR` | naming  | `0.0.0.0:6001`   |
//! | `DFS_STORAGE_ROOT`      | storage | none (required)  |
//! | `DFS_HOSTNAME`          | storage | `127.0.0.1`      |
//! | `DFS_NAMING_HOST`       | storage | `127.0.0.1`      |
//! | `DFS_REGISTRATION_PORT` | storage | `6001`           |
//! | `DFS_STORAGE_ADDR`      | storage | system-assigned  |
//! | `DFS_COMMAND_ADDR`      | storage | system-assigned  |

use crate::naming::protocol::{REGISTRATION_PORT, SERVICE_PORT};

use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// Reads and parses an environment variable. Unset means `None`.
fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value {:?} for {}", value, name)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("cannot read {}", name)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConfig {
    pub service_addr: SocketAddr,
    pub registration_addr: SocketAddr,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, SERVICE_PORT)),
            registration_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, REGISTRATION_PORT)),
        }
    }
}

impl NamingConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            service_addr: env_var("DFS_SERVICE_ADDR")?.unwrap_or(defaults.service_addr),
            registration_addr: env_var("DFS_REGISTRATION_ADDR")?
                .unwrap_or(defaults.registration_addr),
        })
    }

    /// Both interfaces on system-assigned loopback ports.
    pub fn ephemeral() -> Self {
        let any_port = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        Self {
            service_addr: any_port,
            registration_addr: any_port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Local directory holding the served files.
    pub root: PathBuf,
    /// Hostname advertised in the stubs sent to the naming server.
    pub hostname: String,
    pub naming_host: String,
    pub registration_port: u16,
    pub storage_addr: Option<SocketAddr>,
    pub command_addr: Option<SocketAddr>,
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hostname: Ipv4Addr::LOCALHOST.to_string(),
            naming_host: Ipv4Addr::LOCALHOST.to_string(),
            registration_port: REGISTRATION_PORT,
            storage_addr: None,
            command_addr: None,
        }
    }

    /// Reads the configuration from the environment. `root` overrides
    /// `DFS_STORAGE_ROOT`; one of the two is required.
    pub fn from_env(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => env_var::<PathBuf>("DFS_STORAGE_ROOT")?
                .context("a storage root is required (--root or DFS_STORAGE_ROOT)")?,
        };
        let defaults = Self::new(root);

        Ok(Self {
            hostname: env_var("DFS_HOSTNAME")?.unwrap_or(defaults.hostname.clone()),
            naming_host: env_var("DFS_NAMING_HOST")?.unwrap_or(defaults.naming_host.clone()),
            registration_port: env_var("DFS_REGISTRATION_PORT")?
                .unwrap_or(defaults.registration_port),
            storage_addr: env_var("DFS_STORAGE_ADDR")?,
            command_addr: env_var("DFS_COMMAND_ADDR")?,
            ..defaults
        })
    }
}
