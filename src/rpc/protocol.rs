//! RPC Wire Protocol
//!
//! Defines remote interfaces and the two frames exchanged on every connection.
//!
//! A connection carries exactly one exchange:
//! 1. The client sends a `CallFrame`: interface name, method name, parameter type names
//!    and the bincode-encoded typed call.
//! 2. The server answers with a `ReplyFrame`: a success flag followed by either the
//!    encoded return value or the encoded error.
//! 3. The connection is closed.
//!
//! Frames are a big-endian `u32` length followed by a bincode body.

use super::error::{RpcError, SetupError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame body.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Static description of one method of a remote interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub params: &'static [&'static str],
    /// Whether the method is declared to fail with `RpcError`.
    pub raises_transport: bool,
}

impl MethodDescriptor {
    pub const fn remote(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            params,
            raises_transport: true,
        }
    }

    /// A method that cannot report transport failures. Interfaces containing one are
    /// rejected when a skeleton or stub is created for them.
    pub const fn local(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            params,
            raises_transport: false,
        }
    }

    pub fn matches(&self, name: &str, params: &[String]) -> bool {
        self.name == name
            && self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(a, b)| *a == b.as_str())
    }
}

/// An interface that can be served by a `Skeleton` and called through a `Stub`.
///
/// Each interface enumerates its calls in `Call`, its return values in `Reply`, and its
/// application errors in `Error`. `Error: From<RpcError>` is what lets every method
/// report transport failures.
pub trait RemoteInterface: 'static {
    const NAME: &'static str;

    type Call: Serialize + DeserializeOwned + fmt::Debug + Send + 'static;
    type Reply: Serialize + DeserializeOwned + fmt::Debug + Send + 'static;
    type Error: From<RpcError>
        + Serialize
        + DeserializeOwned
        + fmt::Debug
        + fmt::Display
        + Send
        + 'static;

    /// Every method of the interface.
    fn methods() -> &'static [MethodDescriptor];

    /// The method a call invokes.
    fn describe(call: &Self::Call) -> &'static MethodDescriptor;
}

/// Rejects interfaces with a method that is not marked as raising `RpcError`.
pub fn check_remote_interface<I: RemoteInterface>() -> Result<(), SetupError> {
    match I::methods().iter().find(|method| !method.raises_transport) {
        Some(method) => Err(SetupError::NotRemoteInterface {
            interface: I::NAME,
            method: method.name,
        }),
        None => Ok(()),
    }
}

/// Request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFrame {
    pub interface: String,
    pub method: String,
    pub param_types: Vec<String>,
    pub arguments: Vec<u8>,
}

impl CallFrame {
    pub fn encode<I: RemoteInterface>(call: &I::Call) -> Result<Self, RpcError> {
        let method = I::describe(call);
        let arguments = bincode::serialize(call).map_err(|e| RpcError::Malformed(e.to_string()))?;

        Ok(Self {
            interface: I::NAME.to_string(),
            method: method.name.to_string(),
            param_types: method.params.iter().map(|p| p.to_string()).collect(),
            arguments,
        })
    }

    /// Looks the method up on `I` by name and parameter types, then decodes the call.
    pub fn decode<I: RemoteInterface>(&self) -> Result<I::Call, RpcError> {
        let no_such_method = || RpcError::NoSuchMethod {
            interface: self.interface.clone(),
            method: self.method.clone(),
            params: self.param_types.join(", "),
        };

        if self.interface != I::NAME {
            return Err(no_such_method());
        }

        let method = I::methods()
            .iter()
            .find(|m| m.matches(&self.method, &self.param_types))
            .ok_or_else(no_such_method)?;

        let call: I::Call = bincode::deserialize(&self.arguments)
            .map_err(|e| RpcError::Malformed(format!("arguments of {}: {}", method.name, e)))?;

        if I::describe(&call) != method {
            return Err(RpcError::Malformed(format!(
                "arguments do not match method {}",
                method.name
            )));
        }

        Ok(call)
    }
}

/// Response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub success: bool,
    pub payload: Vec<u8>,
}

impl ReplyFrame {
    pub fn returned<T: Serialize>(value: &T) -> Result<Self, RpcError> {
        Ok(Self {
            success: true,
            payload: bincode::serialize(value).map_err(|e| RpcError::Malformed(e.to_string()))?,
        })
    }

    pub fn raised<E: Serialize>(error: &E) -> Result<Self, RpcError> {
        Ok(Self {
            success: false,
            payload: bincode::serialize(error).map_err(|e| RpcError::Malformed(e.to_string()))?,
        })
    }

    /// Rebuilds what the remote method returned or raised.
    pub fn into_result<I: RemoteInterface>(self) -> Result<I::Reply, I::Error> {
        if self.success {
            bincode::deserialize::<I::Reply>(&self.payload)
                .map_err(|e| RpcError::Malformed(format!("return value: {}", e)).into())
        } else {
            let error = bincode::deserialize::<I::Error>(&self.payload)
                .map_err(|e| RpcError::Malformed(format!("raised error: {}", e)))?;
            Err(error)
        }
    }
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds the limit", body.len()),
            )
        })?;

    writer.write_u32(len).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

pub async fn read_frame<R, T>(reader: &mut R) -> std::io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds the limit", len),
        ));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    bincode::deserialize(&body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Error for a reply variant that does not belong to the method that was called.
pub fn unexpected_reply<I: RemoteInterface>(method: &str, reply: &I::Reply) -> RpcError {
    RpcError::Malformed(format!(
        "{}::{} received unexpected reply {:?}",
        I::NAME,
        method,
        reply
    ))
}
