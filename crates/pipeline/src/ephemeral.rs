//! Guards for locally materialized files.
//!
//! An [`EphemeralFile`] deletes its path when dropped. A [`Scratch`] owns
//! every intermediate file one pipeline run writes and deletes them all when
//! dropped, whichever way the run ends.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use modelgen_core::validation::UploadedImage;

// ---------------------------------------------------------------------------
// EphemeralFile
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EphemeralFile {
    path: PathBuf,
}

impl EphemeralFile {
    /// Take ownership of an existing path.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EphemeralFile {
    fn drop(&mut self) {
        remove_quietly(&self.path);
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed ephemeral file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove ephemeral file"),
    }
}

// ---------------------------------------------------------------------------
// StagedUpload
// ---------------------------------------------------------------------------

/// A request upload plus the guard that deletes its staged file.
#[derive(Debug)]
pub struct StagedUpload {
    pub image: UploadedImage,
    _file: EphemeralFile,
}

impl StagedUpload {
    pub fn new(image: UploadedImage) -> Self {
        let file = EphemeralFile::adopt(image.path.clone());
        Self { image, _file: file }
    }
}

// ---------------------------------------------------------------------------
// Scratch
// ---------------------------------------------------------------------------

/// Per-run scratch area inside a shared directory.
#[derive(Debug)]
pub struct Scratch {
    dir: PathBuf,
    files: Mutex<Vec<EphemeralFile>>,
}

impl Scratch {
    pub async fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            files: Mutex::new(Vec::new()),
        })
    }

    /// Write `bytes` to `<dir>/<name>.<ext>` and take ownership of the file.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let extension = modelgen_core::media::sniff_extension(bytes);
        let path = self.dir.join(format!("{name}.{extension}"));
        // Register before writing so a partial write is still cleaned up.
        self.track(EphemeralFile::adopt(path.clone()));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    fn track(&self, file: EphemeralFile) {
        match self.files.lock() {
            Ok(mut files) => files.push(file),
            Err(poisoned) => poisoned.into_inner().push(file),
        }
    }

    /// Number of files currently owned.
    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or_else(|p| p.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
