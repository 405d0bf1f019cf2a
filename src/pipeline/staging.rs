//! Local staging area for one batch.
//!
//! A batch owns two directories under the configured work dir: `docs-*`
//! holds the fetched originals and `previews-*` holds one subdirectory of
//! rasterised pages per document. Each piece is a guard that deletes its
//! path when dropped, so an early `?` return or a panic still leaves nothing
//! behind. The explicit `remove`/`close` methods exist so the controller can
//! log a failed deletion instead of silently ignoring it.

use crate::error::{ItemError, PreviewError};
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Staging directories for one batch run.
#[derive(Debug)]
pub struct StagingArea {
    docs: TempDir,
    previews: TempDir,
}

impl StagingArea {
    /// Create fresh `docs-*` and `previews-*` directories under `root`.
    pub fn create(root: &Path) -> Result<Self, PreviewError> {
        let setup = |source: io::Error| PreviewError::StagingSetup {
            path: root.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(root).map_err(setup)?;
        let docs = tempfile::Builder::new()
            .prefix("docs-")
            .tempdir_in(root)
            .map_err(setup)?;
        let previews = tempfile::Builder::new()
            .prefix("previews-")
            .tempdir_in(root)
            .map_err(setup)?;
        debug!(
            "Staging created: {} and {}",
            docs.path().display(),
            previews.path().display()
        );
        Ok(Self { docs, previews })
    }

    pub fn docs_dir(&self) -> &Path {
        self.docs.path()
    }

    pub fn previews_dir(&self) -> &Path {
        self.previews.path()
    }

    /// Write `content` to `<docs>/<id><extension>`.
    pub fn stage_file(&self, id: &str, extension: &str, content: &[u8]) -> Result<StagedFile, ItemError> {
        let name = checked_file_name(id, extension)?;
        let path = self.docs.path().join(name);
        std::fs::write(&path, content).map_err(|source| ItemError::Staging {
            path: path.clone(),
            source,
        })?;
        Ok(StagedFile { path: Some(path) })
    }

    /// Create `<previews>/<id>/` for one document's pages.
    pub fn preview_dir(&self, id: &str) -> Result<ScopedDir, ItemError> {
        let name = checked_file_name(id, "")?;
        let path = self.previews.path().join(name);
        std::fs::create_dir_all(&path).map_err(|source| ItemError::Staging {
            path: path.clone(),
            source,
        })?;
        Ok(ScopedDir { path: Some(path) })
    }

    /// Remove both batch directories.
    pub fn close(self) -> io::Result<()> {
        let docs = self.docs.close();
        let previews = self.previews.close();
        docs.and(previews)
    }
}

/// Reject ids that would escape the staging directory.
fn checked_file_name(id: &str, extension: &str) -> Result<String, ItemError> {
    let mut components = Path::new(id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if id.is_empty() || !single_normal || id.contains(['/', '\\']) {
        return Err(ItemError::InvalidItemId { id: id.to_string() });
    }
    Ok(format!("{id}{extension}"))
}

/// A staged copy of an item's content, deleted on drop.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<PathBuf>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    /// Delete the file now. A file that is already gone is not an error.
    pub fn remove(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => remove_file_if_exists(&path),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = remove_file_if_exists(&path) {
                warn!("Failed to remove staged file {}: {}", path.display(), e);
            }
        }
    }
}

/// A per-item directory, removed with its contents on drop.
#[derive(Debug)]
pub struct ScopedDir {
    path: Option<PathBuf>,
}

impl ScopedDir {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    pub fn remove(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => remove_dir_if_exists(&path),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = remove_dir_if_exists(&path) {
                warn!("Failed to remove preview directory {}: {}", path.display(), e);
            }
        }
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
