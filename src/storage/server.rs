use super::protocol::{CommandApi, StorageApi};
use super::service::StorageService;
use crate::common::{FsError, Path};
use crate::config::StorageConfig;
use crate::naming::protocol::RegistrationApi;
use crate::rpc::{ServerHooks, SetupError, Skeleton, Stub};

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("storage root {0} does not exist or is not a directory")]
    MissingRoot(String),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("registration failed: {0}")]
    Registration(#[source] FsError),

    #[error("local storage: {0}")]
    Local(#[source] FsError),
}

/// A storage server: one `StorageService` behind a storage skeleton and a command skeleton.
pub struct StorageServer {
    service: Arc<StorageService>,
    storage_skeleton: Skeleton<StorageApi, StorageService>,
    command_skeleton: Skeleton<CommandApi, StorageService>,
}

impl StorageServer {
    pub fn new(config: &StorageConfig) -> Result<Self, SetupError> {
        let service = Arc::new(StorageService::new(config.root.clone()));

        let storage_skeleton = match config.storage_addr {
            Some(address) => Skeleton::<StorageApi, _>::with_address(service.clone(), address)?,
            None => Skeleton::<StorageApi, _>::new(service.clone())?,
        }
        .with_hooks(ServerHooks {
            server: "Storage data",
        });

        let command_skeleton = match config.command_addr {
            Some(address) => Skeleton::<CommandApi, _>::with_address(service.clone(), address)?,
            None => Skeleton::<CommandApi, _>::new(service.clone())?,
        }
        .with_hooks(ServerHooks {
            server: "Storage command",
        });

        Ok(Self {
            service,
            storage_skeleton,
            command_skeleton,
        })
    }

    /// Starts both interfaces and registers with the naming server.
    ///
    /// The stubs sent to the naming server carry `hostname`. Every local file the naming
    /// server already knew is deleted, along with directories left empty by the deletion.
    pub async fn start(
        &self,
        hostname: &str,
        naming: &Stub<RegistrationApi>,
    ) -> Result<(), StartError> {
        let root = self.service.root();
        let is_directory = tokio::fs::metadata(root)
            .await
            .is_ok_and(|metadata| metadata.is_dir());
        if !is_directory {
            return Err(StartError::MissingRoot(root.display().to_string()));
        }

        self.storage_skeleton.start().await?;
        self.command_skeleton.start().await?;

        let storage = Stub::for_skeleton_with_host(&self.storage_skeleton, hostname).await?;
        let command = Stub::for_skeleton_with_host(&self.command_skeleton, hostname).await?;

        let files = Path::list_local(root).map_err(StartError::Local)?;
        tracing::info!("Registering {} local files as {}", files.len(), storage);

        let duplicates = naming
            .register(storage, command, files)
            .await
            .map_err(StartError::Registration)?;
        for duplicate in &duplicates {
            self.service
                .discard_duplicate(duplicate)
                .await
                .map_err(StartError::Local)?;
        }
        if !duplicates.is_empty() {
            tracing::info!("Deleted {} duplicate files", duplicates.len());
        }

        Ok(())
    }

    pub async fn stop(&self) {
        self.storage_skeleton.stop().await;
        self.command_skeleton.stop().await;
    }

    pub fn service(&self) -> &Arc<StorageService> {
        &self.service
    }

    pub fn storage_stub(&self) -> Result<Stub<StorageApi>, SetupError> {
        Stub::for_skeleton(&self.storage_skeleton)
    }

    pub fn command_stub(&self) -> Result<Stub<CommandApi>, SetupError> {
        Stub::for_skeleton(&self.command_skeleton)
    }
}
