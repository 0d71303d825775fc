//! Common Types Module
//!
//! Types shared by every part of the filesystem: the naming server, the storage nodes
//! and their clients.
//!
//! ## Contents
//! - **`path`**: `Path`, the immutable hierarchical file identifier used by all remote
//!   interfaces. Component validation happens at every construction site.
//! - **`error`**: `FsError`, the application-level failure carried across remote calls
//!   (not-found, conflicts, bounds violations) next to the transport failure kind.

pub mod error;
pub mod path;

pub use error::FsError;
pub use path::{Path, PathError};

#[cfg(test)]
mod tests;
