//! Server and configuration error types.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("TLS is enabled but {0} is not set")]
    MissingTlsFile(&'static str),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to load TLS certificate/key: {0}")]
    Tls(io::Error),

    #[error("server I/O error: {0}")]
    Io(#[from] io::Error),
}
