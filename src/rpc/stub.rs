//! RPC Stub (client side)
//!
//! A `Stub` is an immutable capability: the identity of a remote interface plus the
//! resolved address of the skeleton serving it. Stubs are plain values. They can be
//! compared, hashed, used as map keys, and sent inside other remote calls.

use super::error::{RpcError, SetupError};
use super::protocol::{
    CallFrame, RemoteInterface, ReplyFrame, check_remote_interface, read_frame, write_frame,
};
use super::skeleton::{Dispatch, Skeleton};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::TcpStream;

pub struct Stub<I: RemoteInterface> {
    address: SocketAddr,
    _interface: PhantomData<fn() -> I>,
}

impl<I: RemoteInterface> Stub<I> {
    /// Creates a stub for a skeleton running at a known address.
    ///
    /// Used for bootstrapping, when no skeleton handle is available locally.
    pub fn new(address: SocketAddr) -> Result<Self, SetupError> {
        check_remote_interface::<I>()?;

        Ok(Self {
            address,
            _interface: PhantomData,
        })
    }

    /// Creates a stub carrying the address of `skeleton`.
    ///
    /// The skeleton must have been created with an address or already started. A wildcard
    /// address is replaced by the loopback address of the same family.
    pub fn for_skeleton<D: Dispatch<I>>(skeleton: &Skeleton<I, D>) -> Result<Self, SetupError> {
        let mut address = skeleton.address().ok_or(SetupError::NoAddress(I::NAME))?;

        if address.ip().is_unspecified() {
            let loopback = match address.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            address.set_ip(loopback);
        }

        Self::new(address)
    }

    /// Creates a stub carrying the port of `skeleton` and the given hostname.
    ///
    /// For skeletons behind NAT or on private networks, where the bound address is not
    /// reachable by the stub's eventual users.
    pub async fn for_skeleton_with_host<D: Dispatch<I>>(
        skeleton: &Skeleton<I, D>,
        hostname: &str,
    ) -> Result<Self, SetupError> {
        let port = skeleton
            .address()
            .ok_or(SetupError::NoAddress(I::NAME))?
            .port();

        Self::resolve(hostname, port).await
    }

    /// Resolves `hostname` and creates a stub for `port` on the first address found.
    pub async fn resolve(hostname: &str, port: u16) -> Result<Self, SetupError> {
        let address = tokio::net::lookup_host((hostname, port))
            .await
            .ok()
            .and_then(|mut addresses| addresses.next())
            .ok_or_else(|| SetupError::UnknownHost(hostname.to_string()))?;

        Self::new(address)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Performs one remote call.
    ///
    /// Opens a connection, sends the call, waits for the reply and closes the connection.
    /// Errors raised by the remote method come back as the same `I::Error`; transport
    /// failures come back as `I::Error::from(RpcError)`.
    pub async fn invoke(&self, call: I::Call) -> Result<I::Reply, I::Error> {
        let frame = CallFrame::encode::<I>(&call)?;
        tracing::trace!("{} -> {}: {:?}", I::NAME, self.address, call);

        let mut stream = TcpStream::connect(self.address)
            .await
            .map_err(|e| RpcError::connect(self.address, e))?;

        write_frame(&mut stream, &frame)
            .await
            .map_err(|e| RpcError::from_io(self.address, e))?;

        let reply: ReplyFrame = read_frame(&mut stream)
            .await
            .map_err(|e| RpcError::from_io(self.address, e))?;

        reply.into_result::<I>()
    }
}

impl<I: RemoteInterface> Clone for Stub<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: RemoteInterface> Copy for Stub<I> {}

impl<I: RemoteInterface> PartialEq for Stub<I> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl<I: RemoteInterface> Eq for Stub<I> {}

impl<I: RemoteInterface> Hash for Stub<I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        I::NAME.hash(state);
        self.address.hash(state);
    }
}

impl<I: RemoteInterface> fmt::Debug for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stub<{}>({})", I::NAME, self.address)
    }
}

impl<I: RemoteInterface> fmt::Display for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", I::NAME, self.address)
    }
}

#[derive(Serialize, Deserialize)]
struct StubRepr {
    interface: String,
    address: SocketAddr,
}

impl<I: RemoteInterface> Serialize for Stub<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StubRepr {
            interface: I::NAME.to_string(),
            address: self.address,
        }
        .serialize(serializer)
    }
}

impl<'de, I: RemoteInterface> Deserialize<'de> for Stub<I> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = StubRepr::deserialize(deserializer)?;
        if repr.interface != I::NAME {
            return Err(D::Error::custom(format!(
                "expected a stub for {}, got one for {}",
                I::NAME,
                repr.interface
            )));
        }

        Stub::new(repr.address).map_err(D::Error::custom)
    }
}
