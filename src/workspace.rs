use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Scratch directory holding intermediate documents for one run.
///
/// Call [`TempWorkspace::close`] to remove it and observe removal errors.
/// If the workspace is dropped without being closed, removal is attempted
/// and failures are only logged.
#[derive(Debug)]
pub(crate) struct TempWorkspace {
    root: PathBuf,
    closed: bool,
}

impl TempWorkspace {
    /// Creates the directory if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub(crate) fn acquire(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        debug!("Temp workspace ready at {}", root.display());

        Ok(Self {
            root,
            closed: false,
        })
    }

    /// Returns the workspace directory.
    pub(crate) fn path(&self) -> &Path {
        &self.root
    }

    /// Writes the intermediate document for `stem`.
    ///
    /// The returned guard deletes the file when dropped. A failed write
    /// leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub(crate) fn write_intermediate(&self, stem: &str, content: &str) -> Result<IntermediateFile> {
        let file = IntermediateFile {
            path: self.root.join(format!("{stem}.html")),
        };

        let mut handle = fs::File::create(&file.path).map_err(|e| Error::io(&file.path, e))?;
        handle
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&file.path, e))?;
        handle.sync_all().map_err(|e| Error::io(&file.path, e))?;

        Ok(file)
    }

    /// Removes the workspace directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub(crate) fn close(mut self) -> Result<()> {
        self.closed = true;
        remove_tree(&self.root)
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = remove_tree(&self.root) {
            warn!("Failed to remove temp workspace: {}", e);
        }
    }
}

fn remove_tree(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => {
            debug!("Removed temp workspace {}", root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(root, e)),
    }
}

/// An intermediate HTML document, deleted when dropped.
#[derive(Debug)]
pub(crate) struct IntermediateFile {
    path: PathBuf,
}

impl IntermediateFile {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IntermediateFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
