//! Naming Remote Interfaces
//!
//! - **Service**: called by clients to browse and modify the directory tree and to find
//!   the storage server holding a file.
//! - **Registration**: called once by each storage server when it starts.

use crate::common::{FsError, Path};
use crate::rpc::protocol::unexpected_reply;
use crate::rpc::{MethodDescriptor, RemoteInterface, Stub};
use crate::storage::protocol::{CommandApi, StorageApi};

use serde::{Deserialize, Serialize};

/// Well-known port of the service interface.
pub const SERVICE_PORT: u16 = 6000;
/// Well-known port of the registration interface.
pub const REGISTRATION_PORT: u16 = 6001;

// --- Service ---

pub enum ServiceApi {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceCall {
    IsDirectory { path: Path },
    List { directory: Path },
    CreateFile { file: Path },
    CreateDirectory { directory: Path },
    Delete { path: Path },
    GetStorage { file: Path },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceReply {
    IsDirectory(bool),
    Listing(Vec<String>),
    Created(bool),
    Deleted(bool),
    Storage(Stub<StorageApi>),
}

const IS_DIRECTORY: MethodDescriptor = MethodDescriptor::remote("isDirectory", &["Path"]);
const LIST: MethodDescriptor = MethodDescriptor::remote("list", &["Path"]);
const CREATE_FILE: MethodDescriptor = MethodDescriptor::remote("createFile", &["Path"]);
const CREATE_DIRECTORY: MethodDescriptor = MethodDescriptor::remote("createDirectory", &["Path"]);
const DELETE: MethodDescriptor = MethodDescriptor::remote("delete", &["Path"]);
const GET_STORAGE: MethodDescriptor = MethodDescriptor::remote("getStorage", &["Path"]);

impl RemoteInterface for ServiceApi {
    const NAME: &'static str = "Service";

    type Call = ServiceCall;
    type Reply = ServiceReply;
    type Error = FsError;

    fn methods() -> &'static [MethodDescriptor] {
        &[IS_DIRECTORY, LIST, CREATE_FILE, CREATE_DIRECTORY, DELETE, GET_STORAGE]
    }

    fn describe(call: &ServiceCall) -> &'static MethodDescriptor {
        match call {
            ServiceCall::IsDirectory { .. } => &IS_DIRECTORY,
            ServiceCall::List { .. } => &LIST,
            ServiceCall::CreateFile { .. } => &CREATE_FILE,
            ServiceCall::CreateDirectory { .. } => &CREATE_DIRECTORY,
            ServiceCall::Delete { .. } => &DELETE,
            ServiceCall::GetStorage { .. } => &GET_STORAGE,
        }
    }
}

impl Stub<ServiceApi> {
    pub async fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        match self.invoke(ServiceCall::IsDirectory { path: path.clone() }).await? {
            ServiceReply::IsDirectory(is_directory) => Ok(is_directory),
            other => Err(unexpected_reply::<ServiceApi>(IS_DIRECTORY.name, &other).into()),
        }
    }

    pub async fn list(&self, directory: &Path) -> Result<Vec<String>, FsError> {
        let call = ServiceCall::List {
            directory: directory.clone(),
        };

        match self.invoke(call).await? {
            ServiceReply::Listing(names) => Ok(names),
            other => Err(unexpected_reply::<ServiceApi>(LIST.name, &other).into()),
        }
    }

    pub async fn create_file(&self, file: &Path) -> Result<bool, FsError> {
        match self.invoke(ServiceCall::CreateFile { file: file.clone() }).await? {
            ServiceReply::Created(created) => Ok(created),
            other => Err(unexpected_reply::<ServiceApi>(CREATE_FILE.name, &other).into()),
        }
    }

    pub async fn create_directory(&self, directory: &Path) -> Result<bool, FsError> {
        let call = ServiceCall::CreateDirectory {
            directory: directory.clone(),
        };

        match self.invoke(call).await? {
            ServiceReply::Created(created) => Ok(created),
            other => Err(unexpected_reply::<ServiceApi>(CREATE_DIRECTORY.name, &other).into()),
        }
    }

    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        match self.invoke(ServiceCall::Delete { path: path.clone() }).await? {
            ServiceReply::Deleted(deleted) => Ok(deleted),
            other => Err(unexpected_reply::<ServiceApi>(DELETE.name, &other).into()),
        }
    }

    pub async fn get_storage(&self, file: &Path) -> Result<Stub<StorageApi>, FsError> {
        match self.invoke(ServiceCall::GetStorage { file: file.clone() }).await? {
            ServiceReply::Storage(storage) => Ok(storage),
            other => Err(unexpected_reply::<ServiceApi>(GET_STORAGE.name, &other).into()),
        }
    }
}

// --- Registration ---

pub enum RegistrationApi {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistrationCall {
    Register {
        storage: Stub<StorageApi>,
        command: Stub<CommandApi>,
        files: Vec<Path>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistrationReply {
    /// Offered files the naming server already knew about.
    Duplicates(Vec<Path>),
}

const REGISTER: MethodDescriptor =
    MethodDescriptor::remote("register", &["Storage", "Command", "Path[]"]);

impl RemoteInterface for RegistrationApi {
    const NAME: &'static str = "Registration";

    type Call = RegistrationCall;
    type Reply = RegistrationReply;
    type Error = FsError;

    fn methods() -> &'static [MethodDescriptor] {
        &[REGISTER]
    }

    fn describe(call: &RegistrationCall) -> &'static MethodDescriptor {
        match call {
            RegistrationCall::Register { .. } => &REGISTER,
        }
    }
}

impl Stub<RegistrationApi> {
    /// Registers a storage server and returns the offered files it must delete locally.
    pub async fn register(
        &self,
        storage: Stub<StorageApi>,
        command: Stub<CommandApi>,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        let call = RegistrationCall::Register {
            storage,
            command,
            files,
        };

        match self.invoke(call).await? {
            RegistrationReply::Duplicates(duplicates) => Ok(duplicates),
        }
    }
}

/// Stub for the service interface of the naming server on `hostname`.
pub async fn service_stub(hostname: &str) -> Result<Stub<ServiceApi>, crate::rpc::SetupError> {
    Stub::resolve(hostname, SERVICE_PORT).await
}

/// Stub for the registration interface of the naming server on `hostname`.
pub async fn registration_stub(
    hostname: &str,
) -> Result<Stub<RegistrationApi>, crate::rpc::SetupError> {
    Stub::resolve(hostname, REGISTRATION_PORT).await
}
