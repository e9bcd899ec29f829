//! Errors raised while building shared types from configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("invalid blocklist address {address:?}: {source}")]
    InvalidBlockListAddress {
        address: String,
        source: std::net::AddrParseError,
    },
}
