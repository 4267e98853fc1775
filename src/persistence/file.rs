use std::path::{Path, PathBuf};

use super::{Error, ManagedContainer, Result, TargetGroup, TargetGroupPersister};
use crate::fsutil;

/// Writes the snapshot as a JSON array of target groups to a single file.
#[derive(Debug, Clone)]
pub struct FileTargetGroupPersister {
    path: PathBuf,
}

impl FileTargetGroupPersister {
    /// Creates a persister for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotJson`] if `path` does not end in `.json` and
    /// [`Error::NotWritable`] if it cannot be opened for writing.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.extension().is_none_or(|ext| ext != "json") {
            return Err(Error::NotJson { path });
        }
        fsutil::ensure_writable(&path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serializes the snapshot in the order it is given.
pub(crate) fn encode(snapshot: &[ManagedContainer]) -> Result<Vec<u8>> {
    let groups: Vec<&TargetGroup> = snapshot
        .iter()
        .map(|container| &container.target_group)
        .collect();

    serde_json::to_vec(&groups).map_err(Error::Serialize)
}

impl TargetGroupPersister for FileTargetGroupPersister {
    async fn write(&self, snapshot: &[ManagedContainer]) -> Result<()> {
        let data = encode(snapshot)?;
        log::debug!(
            "Write {} to {}",
            String::from_utf8_lossy(&data),
            self.path.display()
        );

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || fsutil::replace_file(&path, &data))
            .await
            .map_err(|source| Error::WriteTask {
                path: self.path.clone(),
                source,
            })?
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })
    }
}
