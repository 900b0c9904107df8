//! The host workspace as seen by the pipeline.

use std::io;
use std::path::{Path, PathBuf};

/// Editor-side operations the pipeline needs.
///
/// Implemented by the editor integration; [`DirectoryWorkspace`] covers a
/// plain set of project folders without open editors.
#[cfg_attr(test, mockall::automock)]
pub trait Workspace: Send + Sync {
    /// Paths of every open editor that is backed by a file.
    fn open_editors(&self) -> Vec<PathBuf>;

    /// Path of the focused editor, if it is backed by a file.
    fn active_editor(&self) -> Option<PathBuf>;

    /// Writes the editor showing `path` to disk.
    fn save(&self, path: &Path) -> io::Result<()>;

    /// The project folder containing `path`.
    fn project_root_for(&self, path: &Path) -> Option<PathBuf>;
}

/// A workspace made of project folders on disk.
///
/// Files are never buffered, so saving is a no-op.
#[derive(Debug, Clone, Default)]
pub struct DirectoryWorkspace {
    roots: Vec<PathBuf>,
    active: Option<PathBuf>,
}

impl DirectoryWorkspace {
    /// Creates a workspace with a single project folder.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            active: None,
        }
    }

    /// Adds another project folder.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Marks `file` as the focused file.
    #[must_use]
    pub fn with_active(mut self, file: impl Into<PathBuf>) -> Self {
        self.active = Some(file.into());
        self
    }

    /// The project folders.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Workspace for DirectoryWorkspace {
    fn open_editors(&self) -> Vec<PathBuf> {
        self.active.iter().cloned().collect()
    }

    fn active_editor(&self) -> Option<PathBuf> {
        self.active.clone()
    }

    fn save(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn project_root_for(&self, path: &Path) -> Option<PathBuf> {
        self.roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }
}
