//! Distributed Filesystem Library
//!
//! A filesystem split into one naming server, which owns the directory tree, and any
//! number of storage servers, which hold file contents. All communication goes through a
//! small RPC layer built for this crate. The binary (`main.rs`) runs either server.
//!
//! ## Architecture Modules
//! - **`common`**: `Path`, the hierarchical file identifier, and `FsError`, the error type
//!   shared by every filesystem interface.
//! - **`config`**: Server addresses and storage roots, with environment overrides.
//! - **`naming`**: The naming server. Resolves paths, places new files on storage servers,
//!   registers storage servers and forwards deletions to them.
//! - **`rpc`**: Skeletons and stubs. Exposes an object's interface over TCP with errors
//!   propagated to the caller and transport failures reported separately.
//! - **`storage`**: The storage server. Serves file contents from a local directory and
//!   obeys creation and deletion commands from the naming server.

pub mod common;
pub mod config;
pub mod naming;
pub mod rpc;
pub mod storage;
