//! Remote Procedure Call Module
//!
//! A small RPC layer that exposes an object's interface across the network. Calls look
//! like local async method calls; errors raised by the remote method are re-raised at the
//! caller with their original kind and message.
//!
//! ## Core Mechanisms
//! - **Interfaces**: A `RemoteInterface` enumerates its calls, replies and errors, with a
//!   descriptor table used for lookup by method name and parameter types.
//! - **Skeletons**: A `Skeleton` serves one interface for one implementation object, one
//!   tokio task per connection, one exchange per connection.
//! - **Stubs**: A `Stub` is a comparable `(interface, address)` value that performs calls.
//! - **Failures**: Every method can fail with `RpcError`, the transport failure kind, which
//!   is never confused with the interface's own errors.

pub mod error;
pub mod protocol;
pub mod skeleton;
pub mod stub;

pub use error::{RpcError, SetupError};
pub use protocol::{MethodDescriptor, RemoteInterface};
pub use skeleton::{DefaultHooks, Dispatch, DispatchFuture, ServerHooks, Skeleton, SkeletonHooks};
pub use stub::Stub;
