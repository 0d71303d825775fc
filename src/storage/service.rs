use super::protocol::{CommandApi, CommandCall, CommandReply, StorageApi, StorageCall, StorageReply};
use crate::common::{FsError, Path};
use crate::rpc::{Dispatch, DispatchFuture};

use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Serves the data and control surfaces of one storage server against a local directory.
///
/// Every operation holds `lock` for its whole duration, so a read never observes a
/// half-finished write.
pub struct StorageService {
    root: PathBuf,
    lock: Mutex<()>,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Length of an existing regular file, or `NotFound`.
    async fn file_len(&self, file: &Path) -> Result<u64, FsError> {
        match tokio::fs::metadata(file.to_local(&self.root)).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(FsError::not_found(format!("{} is a directory", file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FsError::not_found(file)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn size(&self, file: &Path) -> Result<u64, FsError> {
        let _guard = self.lock.lock().await;
        self.file_len(file).await
    }

    pub async fn read(&self, file: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let _guard = self.lock.lock().await;
        let len = self.file_len(file).await?;

        let in_bounds = offset.checked_add(length).is_some_and(|end| end <= len);
        if !in_bounds {
            return Err(FsError::out_of_bounds(format!(
                "{} bytes at offset {} of {} ({} bytes long)",
                length, offset, file, len
            )));
        }

        let length = usize::try_from(length)
            .map_err(|_| FsError::out_of_bounds(format!("{} bytes cannot be buffered", length)))?;

        let mut handle = tokio::fs::File::open(file.to_local(&self.root)).await?;
        handle.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; length];
        handle.read_exact(&mut data).await?;

        tracing::debug!("Read {} bytes of {} at offset {}", length, file, offset);
        Ok(data)
    }

    pub async fn write(&self, file: &Path, offset: u64, data: &[u8]) -> Result<(), FsError> {
        let _guard = self.lock.lock().await;
        let len = self.file_len(file).await?;

        let mut handle = tokio::fs::OpenOptions::new()
            .write(true)
            .open(file.to_local(&self.root))
            .await?;

        if offset > len {
            // Extending with set_len zero-fills the gap.
            handle.set_len(offset).await?;
        }
        handle.seek(SeekFrom::Start(offset)).await?;
        handle.write_all(data).await?;
        handle.flush().await?;

        tracing::debug!("Wrote {} bytes to {} at offset {}", data.len(), file, offset);
        Ok(())
    }

    pub async fn create(&self, file: &Path) -> Result<bool, FsError> {
        if file.is_root() {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        let local = file.to_local(&self.root);

        if let Some(parent) = local.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            tracing::warn!("Cannot create parent directories of {}: {}", file, e);
            return Err(e.into());
        }

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&local)
            .await;

        match created {
            Ok(_) => {
                tracing::debug!("Created {}", file);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => {
                tracing::warn!("Cannot create {}: {}", file, e);
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        let local = path.to_local(&self.root);

        let metadata = match tokio::fs::symlink_metadata(&local).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&local).await
        } else {
            tokio::fs::remove_file(&local).await
        };

        match removed {
            Ok(()) => {
                tracing::debug!("Deleted {}", path);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Cannot delete {}: {}", path, e);
                Err(e.into())
            }
        }
    }

    /// Removes `file` after the naming server reported it as a duplicate, then removes
    /// every ancestor directory left empty. The root itself is never removed.
    pub async fn discard_duplicate(&self, file: &Path) -> Result<(), FsError> {
        let _guard = self.lock.lock().await;

        match tokio::fs::remove_file(file.to_local(&self.root)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut directory = file.parent()?;
        while !directory.is_root() {
            let local = directory.to_local(&self.root);
            let mut entries = tokio::fs::read_dir(&local).await?;
            if entries.next_entry().await?.is_some() {
                break;
            }

            tokio::fs::remove_dir(&local).await?;
            tracing::debug!("Pruned empty directory {}", directory);
            directory = directory.parent()?;
        }

        Ok(())
    }
}

impl Dispatch<StorageApi> for StorageService {
    fn dispatch(&self, call: StorageCall) -> DispatchFuture<'_, StorageApi> {
        Box::pin(async move {
            match call {
                StorageCall::Size { file } => self.size(&file).await.map(StorageReply::Size),
                StorageCall::Read {
                    file,
                    offset,
                    length,
                } => self.read(&file, offset, length).await.map(StorageReply::Data),
                StorageCall::Write { file, offset, data } => {
                    self.write(&file, offset, &data).await?;
                    Ok(StorageReply::Written)
                }
            }
        })
    }
}

impl Dispatch<CommandApi> for StorageService {
    fn dispatch(&self, call: CommandCall) -> DispatchFuture<'_, CommandApi> {
        Box::pin(async move {
            match call {
                CommandCall::Create { file } => self.create(&file).await.map(CommandReply::Created),
                CommandCall::Delete { path } => self.delete(&path).await.map(CommandReply::Deleted),
            }
        })
    }
}
