//! Storage Server Module
//!
//! Holds file contents in a local directory and serves them to clients. The naming server
//! decides what exists; storage servers only store bytes.
//!
//! ## Core Mechanisms
//! - **Data Interface** (`Storage`): `size`, `read`, `write`, called by clients holding a
//!   stub obtained from the naming server.
//! - **Command Interface** (`Command`): `create`, `delete`, called only by the naming server.
//! - **Registration**: On start, the server lists its local files, registers with the
//!   naming server and deletes the files the naming server reports as duplicates.

pub mod protocol;
pub mod server;
pub mod service;

pub use protocol::{CommandApi, StorageApi};
pub use server::{StartError, StorageServer};
pub use service::StorageService;
