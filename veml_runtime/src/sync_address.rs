use std::fmt;
use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncAddressError {
    #[error("empty synchronizer address")]
    Empty,
    #[error("unknown address scheme '{0}' (expected plain or tls)")]
    UnknownScheme(String),
    #[error("invalid port '{value}': {source}")]
    InvalidPort {
        value: String,
        source: ParseIntError,
    },
    #[error("malformed synchronizer address '{0}' (expected [plain:|tls:]host:port)")]
    Malformed(String),
    #[error("unknown synchronization type '{0}'")]
    UnknownTransport(String),
}

/// Host and port of a synchronization service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchronizerEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl fmt::Display for SynchronizerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.use_tls { "tls" } else { "plain" };
        write!(f, "{scheme}:{}:{}", self.host, self.port)
    }
}

/// Parses `[plain:|tls:]host:port`. A missing scheme means `plain`.
pub fn parse_sync_address(address: &str) -> Result<SynchronizerEndpoint, SyncAddressError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(SyncAddressError::Empty);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (use_tls, host, port) = match parts.as_slice() {
        [scheme, host, port] => {
            let use_tls = match scheme.to_ascii_lowercase().as_str() {
                "plain" => false,
                "tls" => true,
                _ => return Err(SyncAddressError::UnknownScheme(scheme.to_string())),
            };
            (use_tls, *host, *port)
        }
        [host, port] => (false, *host, *port),
        _ => return Err(SyncAddressError::Malformed(trimmed.to_string())),
    };
    if host.is_empty() {
        return Err(SyncAddressError::Malformed(trimmed.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|source| SyncAddressError::InvalidPort {
            value: port.to_string(),
            source,
        })?;

    Ok(SynchronizerEndpoint {
        host: host.to_string(),
        port,
        use_tls,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTransport {
    Tcp,
    WebSocket,
}

impl SyncTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTransport::Tcp => "tcp",
            SyncTransport::WebSocket => "websocket",
        }
    }
}

pub fn parse_sync_transport(value: &str) -> Result<SyncTransport, SyncAddressError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "tcp" => Ok(SyncTransport::Tcp),
        "websocket" | "ws" => Ok(SyncTransport::WebSocket),
        other => Err(SyncAddressError::UnknownTransport(other.to_string())),
    }
}
