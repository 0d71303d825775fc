use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// The transport failure kind.
///
/// Every method of a remote interface can fail with this error in addition to its
/// application errors. It is serializable because a server may have to report a failed
/// method lookup, and because a server that calls other servers passes its own transport
/// failures on to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RpcError {
    #[error("could not connect to {address}: {reason}")]
    Connect { address: SocketAddr, reason: String },

    #[error("connection with {address} failed during the call: {reason}")]
    Disconnected { address: SocketAddr, reason: String },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("remote interface {interface} has no method {method}({params})")]
    NoSuchMethod {
        interface: String,
        method: String,
        params: String,
    },
}

impl RpcError {
    pub(crate) fn connect(address: SocketAddr, err: std::io::Error) -> Self {
        RpcError::Connect {
            address,
            reason: err.to_string(),
        }
    }

    /// Classifies an I/O error raised while exchanging frames with `address`.
    pub(crate) fn from_io(address: SocketAddr, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => RpcError::Malformed(err.to_string()),
            _ => RpcError::Disconnected {
                address,
                reason: err.to_string(),
            },
        }
    }
}

/// Errors raised while binding an interface or managing a skeleton's lifecycle.
///
/// These never cross the network.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("{interface} is not a remote interface: method {method} cannot raise RpcError")]
    NotRemoteInterface {
        interface: &'static str,
        method: &'static str,
    },

    #[error("skeleton for {0} has not been assigned an address")]
    NoAddress(&'static str),

    #[error("skeleton for {0} is already running")]
    AlreadyRunning(&'static str),

    #[error("skeleton for {0} has been stopped and cannot be restarted")]
    Stopped(&'static str),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown host {0}")]
    UnknownHost(String),
}
