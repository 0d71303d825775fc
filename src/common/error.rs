//! Filesystem Errors
//!
//! `FsError` is the application error type of every filesystem remote interface. It
//! crosses the network intact: a `NotFound` raised inside the naming server reaches the
//! client as the same `NotFound` with the same message.
//!
//! Transport failures are wrapped in `FsError::Rpc` and are never mixed with the
//! application variants.

use crate::rpc::RpcError;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FsError {
    /// A path did not resolve, or resolved to the wrong kind of node.
    #[error("not found: {0}")]
    NotFound(String),

    /// An argument was rejected before any work was done.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A storage server tried to register a second time.
    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    /// The operation cannot run in the current state (e.g. no storage servers).
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A read or write fell outside the file.
    #[error("index out of bounds: {0}")]
    OutOfBounds(String),

    /// Local I/O failed on a storage server.
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl FsError {
    pub fn not_found(what: impl Display) -> Self {
        FsError::NotFound(what.to_string())
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        FsError::InvalidArgument(reason.into())
    }

    pub fn illegal_state(reason: impl Into<String>) -> Self {
        FsError::IllegalState(reason.into())
    }

    pub fn out_of_bounds(reason: impl Into<String>) -> Self {
        FsError::OutOfBounds(reason.into())
    }

    /// True for failures of the transport rather than of the operation itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, FsError::Rpc(_))
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(err.to_string()),
            _ => FsError::Io(err.to_string()),
        }
    }
}

impl From<super::path::PathError> for FsError {
    fn from(err: super::path::PathError) -> Self {
        FsError::InvalidArgument(err.to_string())
    }
}
