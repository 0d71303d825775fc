//! Storage Server Registry
//!
//! Remembers which data stub belongs to which command stub. Each storage server registers
//! exactly once; the association is never updated or removed.

use crate::common::FsError;
use crate::rpc::Stub;
use crate::storage::protocol::{CommandApi, StorageApi};

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct StorageRegistry {
    /// Command stubs in registration order, the candidates for placement.
    commands: Vec<Stub<CommandApi>>,
    storage_by_command: HashMap<Stub<CommandApi>, Stub<StorageApi>>,
    command_by_storage: HashMap<Stub<StorageApi>, Stub<CommandApi>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new storage server.
    ///
    /// Fails with `AlreadyRegistered` if either stub is already known.
    pub fn register(
        &mut self,
        storage: Stub<StorageApi>,
        command: Stub<CommandApi>,
    ) -> Result<(), FsError> {
        if self.storage_by_command.contains_key(&command) {
            return Err(FsError::AlreadyRegistered(command.to_string()));
        }
        if self.command_by_storage.contains_key(&storage) {
            return Err(FsError::AlreadyRegistered(storage.to_string()));
        }

        self.commands.push(command);
        self.storage_by_command.insert(command, storage);
        self.command_by_storage.insert(storage, command);

        tracing::info!("Registered storage server: {} / {}", storage, command);
        Ok(())
    }

    pub fn storage_for(&self, command: &Stub<CommandApi>) -> Option<Stub<StorageApi>> {
        self.storage_by_command.get(command).copied()
    }

    pub fn command_for(&self, storage: &Stub<StorageApi>) -> Option<Stub<CommandApi>> {
        self.command_by_storage.get(storage).copied()
    }

    pub fn is_registered(&self, storage: &Stub<StorageApi>) -> bool {
        self.command_by_storage.contains_key(storage)
    }

    pub fn commands(&self) -> &[Stub<CommandApi>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
