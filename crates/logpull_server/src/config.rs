//! Server configuration and the on-disk config file.

use crate::error::{ServerError, ServerResult};
use logpull_core::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Certificate material for the mutual-TLS listener. All files are PEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Server certificate chain.
    pub cert_path: PathBuf,
    /// Server private key.
    pub key_path: PathBuf,
    /// CA bundle client certificates must chain to.
    pub client_ca_path: PathBuf,
}

/// Configuration for the feed server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub listen_address: String,
    /// Data directory of the feed store.
    pub data_path: PathBuf,
    /// TLS material.
    pub tls: TlsConfig,
    /// Store options.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Creates a configuration with default store options.
    pub fn new(listen_address: impl Into<String>, data_path: impl Into<PathBuf>, tls: TlsConfig) -> Self {
        Self {
            listen_address: listen_address.into(),
            data_path: data_path.into(),
            tls,
            store: StoreConfig::default(),
        }
    }

    /// Sets the store options.
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// The config file as written by operators.
///
/// ```toml
/// cert = "/etc/logpull/server.crt"
/// key = "/etc/logpull/server.key"
///
/// [server]
/// listen_address = "0.0.0.0:10000"
/// path = "/var/lib/logpull"
/// client_ca_cert = "/etc/logpull/clients-ca.crt"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Server certificate path.
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// Server key path.
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// The `server` section.
    #[serde(default)]
    pub server: Option<ConfigFileServer>,
}

/// The `server` section of [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileServer {
    /// `host:port` to listen on.
    #[serde(default)]
    pub listen_address: Option<String>,
    /// Data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Client CA bundle path.
    #[serde(default)]
    pub client_ca_cert: Option<PathBuf>,
}

impl ConfigFile {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("could not read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parses config file text.
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] if the text is not valid TOML.
    pub fn parse(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(format!("invalid config: {e}")))
    }

    /// Validates the file into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] naming the first missing or empty key.
    pub fn into_server_config(self) -> ServerResult<ServerConfig> {
        let server = self
            .server
            .ok_or_else(|| ServerError::Config("server configuration not provided".into()))?;

        let listen_address = server
            .listen_address
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("server.listen_address"))?;
        let data_path = required_path(server.path, "server.path")?;
        let client_ca_path = required_path(server.client_ca_cert, "server.client_ca_cert")?;
        let cert_path = required_path(self.cert, "cert")?;
        let key_path = required_path(self.key, "key")?;

        Ok(ServerConfig::new(
            listen_address,
            data_path,
            TlsConfig {
                cert_path,
                key_path,
                client_ca_path,
            },
        ))
    }
}

fn missing(key: &str) -> ServerError {
    ServerError::Config(format!("{key} not provided"))
}

fn required_path(value: Option<PathBuf>, key: &str) -> ServerResult<PathBuf> {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| missing(key))
}
