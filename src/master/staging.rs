use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DarkError, Result};

/// Name of the staging directory created inside the output root.
/// Library folder names are sanitized to `[A-Za-z0-9_-]`, so none can match it.
pub const STAGING_DIR_NAME: &str = ".master_dark_tmp";

/// Scratch directory holding copies of the frames being stacked.
///
/// The directory is removed when the guard is dropped, on every exit path.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    released: bool,
}

impl StagingDir {
    /// Create a fresh staging directory under `output_root`.
    ///
    /// A stale directory from an aborted run is deleted first; if it cannot be
    /// cleared the result is `StagingConflict`.
    pub fn acquire(output_root: &Path) -> Result<Self> {
        let path = output_root.join(STAGING_DIR_NAME);

        match fs::remove_dir_all(&path) {
            Ok(()) => warn!("🧹 Removed stale staging directory {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(DarkError::StagingConflict { path, source }),
        }

        if let Err(source) = fs::create_dir_all(&path) {
            return Err(DarkError::StagingConflict { path, source });
        }

        debug!("Staging directory ready: {}", path.display());
        Ok(StagingDir {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy a frame into the staging directory (the source is only read).
    ///
    /// `index` prefixes the copy so frames with equal file names from
    /// different folders do not overwrite each other.
    pub fn stage(&self, index: usize, frame: &Path) -> Result<PathBuf> {
        let file_name = frame
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "frame.fit".to_string());
        let target = self.path.join(format!("{:04}_{}", index + 1, file_name));

        fs::copy(frame, &target).map_err(|e| {
            DarkError::io(
                format!(
                    "copying frame {} into staging (rescan the library if it was moved)",
                    frame.display()
                ),
                e,
            )
        })?;
        Ok(target)
    }

    /// Remove the directory now and report failures
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove(&self.path)
            .map_err(|e| DarkError::io(format!("removing staging directory {}", self.path.display()), e))
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove(&self.path) {
            warn!("⚠️  Could not remove staging directory {}: {}", self.path.display(), e);
        }
    }
}

fn remove(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
