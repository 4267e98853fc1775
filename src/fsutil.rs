use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Error that occurs when a path cannot be opened for writing.
#[derive(Debug, thiserror::Error)]
#[error("file `{path}` is not writable: {source}")]
pub struct NotWritableError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Checks that `path` can be opened for writing, creating an empty file if it
/// does not exist yet. Existing content is left untouched.
///
/// # Errors
///
/// Returns a [`NotWritableError`] if the file cannot be opened for writing.
///
/// # Example
/// ```no_run
/// # use docker_labels_discovery::fsutil;
/// fsutil::ensure_writable("/etc/prometheus/targets/docker.json")?;
/// # Ok::<(), fsutil::NotWritableError>(())
/// ```
pub fn ensure_writable(path: impl AsRef<Path>) -> Result<(), NotWritableError> {
    let path = path.as_ref();
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map(|_| ())
        .map_err(|source| NotWritableError {
            path: path.to_path_buf(),
            source,
        })
}

/// Replaces the content of `path` with `contents`.
///
/// The data is written to a temporary file in the same directory which is then
/// renamed over `path`, so readers never observe a partially written file. If
/// the directory does not accept a temporary file or the rename is refused
/// (e.g. `path` is a bind-mounted file), the file is rewritten in place instead.
pub fn replace_file(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let tmp = match stage_sibling(path, contents) {
        Ok(tmp) => tmp,
        Err(err) => {
            log::debug!(
                "cannot stage a temporary file next to `{}` ({}), rewriting in place",
                path.display(),
                err
            );
            return std::fs::write(path, contents);
        }
    };

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(err) => {
            log::debug!(
                "rename over `{}` failed ({}), rewriting in place",
                path.display(),
                err.error
            );
            std::fs::write(path, contents)
        }
    }
}

fn stage_sibling(path: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(tmp)
}
