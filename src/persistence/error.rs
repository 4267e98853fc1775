use std::path::PathBuf;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file `{path}` does not have a .json extension")]
    NotJson { path: PathBuf },
    #[error(transparent)]
    NotWritable(#[from] fsutil::NotWritableError),
    #[error("failed to serialize target groups: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write target groups to `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write task for `{path}` did not complete: {source}")]
    WriteTask {
        path: PathBuf,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
