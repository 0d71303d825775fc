use super::placement::{PlacementStrategy, RandomPlacement};
use super::protocol::{
    RegistrationApi, RegistrationCall, RegistrationReply, ServiceApi, ServiceCall, ServiceReply,
};
use super::registry::StorageRegistry;
use super::tree::{DirectoryTree, FileEntry};
use crate::common::{FsError, Path};
use crate::rpc::{Dispatch, DispatchFuture, Stub};
use crate::storage::protocol::{CommandApi, StorageApi};

use std::collections::HashSet;
use tokio::sync::Mutex;

/// Everything the naming server knows, guarded by one lock.
#[derive(Debug, Default)]
pub struct NamingState {
    pub tree: DirectoryTree,
    pub registry: StorageRegistry,
}

/// Implements the service and registration interfaces.
///
/// Every operation takes the state lock. `create_file` and `delete` keep it while they call
/// storage servers, so the check and the update they make are atomic with respect to all
/// other operations. Storage servers never call back into the naming server while serving
/// those calls.
pub struct NamingService {
    state: Mutex<NamingState>,
    placement: Box<dyn PlacementStrategy>,
}

impl Default for NamingService {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingService {
    pub fn new() -> Self {
        Self::with_placement(RandomPlacement)
    }

    pub fn with_placement(placement: impl PlacementStrategy) -> Self {
        Self {
            state: Mutex::new(NamingState::default()),
            placement: Box::new(placement),
        }
    }

    // --- Service ---

    pub async fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(true);
        }

        self.state.lock().await.tree.is_directory(path)
    }

    pub async fn list(&self, directory: &Path) -> Result<Vec<String>, FsError> {
        self.state.lock().await.tree.list(directory)
    }

    /// Creates an empty file on one storage server, then records it.
    ///
    /// Nothing is recorded unless the storage server reports that it created the file.
    pub async fn create_file(&self, file: &Path) -> Result<bool, FsError> {
        if file.is_root() {
            return Ok(false);
        }

        let mut state = self.state.lock().await;
        if !state.tree.can_create(file)? {
            return Ok(false);
        }

        let command = self
            .placement
            .select(file, state.registry.commands())
            .ok_or_else(|| FsError::illegal_state("no storage servers are registered"))?;
        let storage = state
            .registry
            .storage_for(&command)
            .ok_or_else(|| FsError::illegal_state(format!("{} is not registered", command)))?;

        tracing::debug!("Placing {} on {}", file, storage);
        if !command.create(file).await? {
            tracing::warn!("{} did not create {}, leaving it unlinked", command, file);
            return Ok(false);
        }

        state.tree.insert_file(file, FileEntry::new(storage))
    }

    pub async fn create_directory(&self, directory: &Path) -> Result<bool, FsError> {
        if directory.is_root() {
            return Ok(false);
        }

        self.state.lock().await.tree.insert_directory(directory)
    }

    /// Deletes a file or directory from every storage server holding it, then from the tree.
    ///
    /// The tree is only modified once every storage server has deleted its copy. The
    /// first storage server that fails, or that had nothing to delete, aborts the operation.
    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }

        let mut state = self.state.lock().await;
        let mut holders: Vec<_> = state.tree.holders_under(path)?.into_iter().collect();
        holders.sort_by_key(|holder| holder.address());

        for storage in holders {
            let Some(command) = state.registry.command_for(&storage) else {
                tracing::warn!("No command stub for {}, skipping delete of {}", storage, path);
                continue;
            };

            if !command.delete(path).await? {
                tracing::warn!("{} had nothing to delete at {}", command, path);
                return Err(FsError::illegal_state(format!(
                    "{} does not hold {}",
                    command, path
                )));
            }
        }

        let removed = state.tree.remove(path)?;
        tracing::debug!("Deleted {} ({} files)", path, removed.len());

        Ok(true)
    }

    /// The storage server clients should contact for `file`.
    pub async fn get_storage(&self, file: &Path) -> Result<Stub<StorageApi>, FsError> {
        let mut state = self.state.lock().await;
        let entry = state.tree.file_mut(file)?;
        entry.access_count += 1;

        Ok(entry.primary)
    }

    // --- Registration ---

    /// Registers a storage server and grafts the files it offers.
    ///
    /// Returns the offered files that were already known; the storage server must delete
    /// its copies. Root paths are ignored, and a path offered twice counts once.
    pub async fn register(
        &self,
        storage: Stub<StorageApi>,
        command: Stub<CommandApi>,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        let mut state = self.state.lock().await;
        state.registry.register(storage, command)?;

        let offered = files.len();
        let mut seen = HashSet::new();
        let duplicates: Vec<Path> = files
            .into_iter()
            .filter(|file| !file.is_root())
            .filter(|file| seen.insert(file.clone()))
            .filter(|file| !state.tree.graft(file, storage))
            .collect();

        tracing::info!(
            "{} offered {} files, {} duplicates",
            storage,
            offered,
            duplicates.len()
        );

        Ok(duplicates)
    }

    // --- Replica bookkeeping ---

    /// Number of `get_storage` calls made for `file`.
    pub async fn access_count(&self, file: &Path) -> Result<u64, FsError> {
        Ok(self.state.lock().await.tree.file(file)?.access_count)
    }

    /// Storage servers holding `file`, primary first.
    pub async fn replicas(&self, file: &Path) -> Result<Vec<Stub<StorageApi>>, FsError> {
        let state = self.state.lock().await;
        let entry = state.tree.file(file)?;

        let mut others: Vec<_> = entry
            .replicas
            .iter()
            .filter(|holder| **holder != entry.primary)
            .copied()
            .collect();
        others.sort_by_key(|holder| holder.address());

        let mut replicas = vec![entry.primary];
        replicas.extend(others);
        Ok(replicas)
    }

    /// Records that a registered storage server now holds a copy of `file`.
    pub async fn add_replica(&self, file: &Path, holder: Stub<StorageApi>) -> Result<bool, FsError> {
        let mut state = self.state.lock().await;
        if !state.registry.is_registered(&holder) {
            return Err(FsError::illegal_state(format!("{} is not registered", holder)));
        }

        Ok(state.tree.file_mut(file)?.replicas.insert(holder))
    }

    /// Forgets the copy of `file` held by `holder`.
    ///
    /// The last holder of a file is never removed. Removing the primary promotes another
    /// holder.
    pub async fn remove_replica(
        &self,
        file: &Path,
        holder: &Stub<StorageApi>,
    ) -> Result<bool, FsError> {
        let mut state = self.state.lock().await;
        let entry = state.tree.file_mut(file)?;

        if entry.replicas.len() <= 1 || !entry.replicas.remove(holder) {
            return Ok(false);
        }

        if entry.primary == *holder
            && let Some(next) = entry.replicas.iter().min_by_key(|h| h.address())
        {
            entry.primary = *next;
        }

        Ok(true)
    }
}

impl Dispatch<ServiceApi> for NamingService {
    fn dispatch(&self, call: ServiceCall) -> DispatchFuture<'_, ServiceApi> {
        Box::pin(async move {
            match call {
                ServiceCall::IsDirectory { path } => {
                    self.is_directory(&path).await.map(ServiceReply::IsDirectory)
                }
                ServiceCall::List { directory } => {
                    self.list(&directory).await.map(ServiceReply::Listing)
                }
                ServiceCall::CreateFile { file } => {
                    self.create_file(&file).await.map(ServiceReply::Created)
                }
                ServiceCall::CreateDirectory { directory } => self
                    .create_directory(&directory)
                    .await
                    .map(ServiceReply::Created),
                ServiceCall::Delete { path } => self.delete(&path).await.map(ServiceReply::Deleted),
                ServiceCall::GetStorage { file } => {
                    self.get_storage(&file).await.map(ServiceReply::Storage)
                }
            }
        })
    }
}

impl Dispatch<RegistrationApi> for NamingService {
    fn dispatch(&self, call: RegistrationCall) -> DispatchFuture<'_, RegistrationApi> {
        Box::pin(async move {
            match call {
                RegistrationCall::Register {
                    storage,
                    command,
                    files,
                } => self
                    .register(storage, command, files)
                    .await
                    .map(RegistrationReply::Duplicates),
            }
        })
    }
}
