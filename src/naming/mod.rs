//! Naming Server Module
//!
//! The single authority over the filesystem's directory tree. It never stores file
//! contents: it knows which storage servers hold each file and sends clients to them.
//!
//! ## Core Mechanisms
//! - **Directory Tree**: An arena of directory and file nodes, resolved component by
//!   component from the root.
//! - **Registration**: Storage servers register once, offering the files they already
//!   hold. Files the tree already knows are returned as duplicates for the storage server
//!   to delete.
//! - **Placement**: New files go to one registered storage server chosen by a pluggable
//!   `PlacementStrategy` (uniformly random by default).
//! - **Forwarding**: File creation and deletion are forwarded to storage servers' command
//!   interfaces while the state lock is held.
//!
//! ## Interfaces
//! - **Service** (port 6000): `is_directory`, `list`, `create_file`, `create_directory`,
//!   `delete`, `get_storage`.
//! - **Registration** (port 6001): `register`.

pub mod placement;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod service;
pub mod tree;

pub use placement::{PlacementStrategy, RandomPlacement, RoundRobinPlacement};
pub use protocol::{REGISTRATION_PORT, RegistrationApi, SERVICE_PORT, ServiceApi};
pub use server::NamingServer;
pub use service::NamingService;

#[cfg(test)]
mod tests;
