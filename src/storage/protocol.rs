//! Storage Remote Interfaces
//!
//! A storage server exposes two interfaces:
//! - **Storage** (data surface): called by clients to read and write file contents.
//! - **Command** (control surface): called by the naming server to create and delete files.
//!
//! Both report failures as `FsError`; transport failures arrive as `FsError::Rpc`.

use crate::common::{FsError, Path};
use crate::rpc::protocol::unexpected_reply;
use crate::rpc::{MethodDescriptor, RemoteInterface, Stub};

use serde::{Deserialize, Serialize};

// --- Storage ---

pub enum StorageApi {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageCall {
    Size { file: Path },
    Read { file: Path, offset: u64, length: u64 },
    Write { file: Path, offset: u64, data: Vec<u8> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageReply {
    Size(u64),
    Data(Vec<u8>),
    Written,
}

const SIZE: MethodDescriptor = MethodDescriptor::remote("size", &["Path"]);
const READ: MethodDescriptor = MethodDescriptor::remote("read", &["Path", "u64", "u64"]);
const WRITE: MethodDescriptor = MethodDescriptor::remote("write", &["Path", "u64", "Vec<u8>"]);

impl RemoteInterface for StorageApi {
    const NAME: &'static str = "Storage";

    type Call = StorageCall;
    type Reply = StorageReply;
    type Error = FsError;

    fn methods() -> &'static [MethodDescriptor] {
        &[SIZE, READ, WRITE]
    }

    fn describe(call: &StorageCall) -> &'static MethodDescriptor {
        match call {
            StorageCall::Size { .. } => &SIZE,
            StorageCall::Read { .. } => &READ,
            StorageCall::Write { .. } => &WRITE,
        }
    }
}

impl Stub<StorageApi> {
    /// Length of `file` in bytes.
    pub async fn size(&self, file: &Path) -> Result<u64, FsError> {
        match self.invoke(StorageCall::Size { file: file.clone() }).await? {
            StorageReply::Size(size) => Ok(size),
            other => Err(unexpected_reply::<StorageApi>(SIZE.name, &other).into()),
        }
    }

    /// Reads `length` bytes of `file` starting at `offset`.
    pub async fn read(&self, file: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let call = StorageCall::Read {
            file: file.clone(),
            offset,
            length,
        };

        match self.invoke(call).await? {
            StorageReply::Data(data) => Ok(data),
            other => Err(unexpected_reply::<StorageApi>(READ.name, &other).into()),
        }
    }

    /// Writes `data` into `file` at `offset`, growing the file as needed.
    pub async fn write(&self, file: &Path, offset: u64, data: Vec<u8>) -> Result<(), FsError> {
        let call = StorageCall::Write {
            file: file.clone(),
            offset,
            data,
        };

        match self.invoke(call).await? {
            StorageReply::Written => Ok(()),
            other => Err(unexpected_reply::<StorageApi>(WRITE.name, &other).into()),
        }
    }
}

// --- Command ---

pub enum CommandApi {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandCall {
    Create { file: Path },
    Delete { path: Path },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandReply {
    Created(bool),
    Deleted(bool),
}

const CREATE: MethodDescriptor = MethodDescriptor::remote("create", &["Path"]);
const DELETE: MethodDescriptor = MethodDescriptor::remote("delete", &["Path"]);

impl RemoteInterface for CommandApi {
    const NAME: &'static str = "Command";

    type Call = CommandCall;
    type Reply = CommandReply;
    type Error = FsError;

    fn methods() -> &'static [MethodDescriptor] {
        &[CREATE, DELETE]
    }

    fn describe(call: &CommandCall) -> &'static MethodDescriptor {
        match call {
            CommandCall::Create { .. } => &CREATE,
            CommandCall::Delete { .. } => &DELETE,
        }
    }
}

impl Stub<CommandApi> {
    /// Creates an empty file, along with any missing parent directories.
    ///
    /// `false` only when the file already exists; local failures are errors.
    pub async fn create(&self, file: &Path) -> Result<bool, FsError> {
        match self.invoke(CommandCall::Create { file: file.clone() }).await? {
            CommandReply::Created(created) => Ok(created),
            other => Err(unexpected_reply::<CommandApi>(CREATE.name, &other).into()),
        }
    }

    /// Deletes a file, or a directory and everything beneath it. `false` when nothing
    /// was there.
    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        match self.invoke(CommandCall::Delete { path: path.clone() }).await? {
            CommandReply::Deleted(deleted) => Ok(deleted),
            other => Err(unexpected_reply::<CommandApi>(DELETE.name, &other).into()),
        }
    }
}
