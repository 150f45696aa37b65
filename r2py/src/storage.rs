//! Working-directory housekeeping for file conversions.
//!
//! Two flat directories are used: one for the uploaded R file and one for the generated Python
//! file. Every upload clears both before writing, so at most one artifact pair exists at a time.
//! The directories are process-wide state; [`Storage::lock`] serialises the upload flow so one
//! request's clear cannot interleave with another's write.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};

/// Extension given to generated files.
pub const OUTPUT_EXTENSION: &str = "py";

/// Create `path` (and any parents) if it does not exist yet.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Delete every regular file directly inside `path`.
///
/// Best-effort: subdirectories are left alone, a missing directory is a no-op, and a file that
/// cannot be removed is logged and skipped.
#[instrument(fields(path = %path.display()))]
pub fn clear_directory(path: &Path) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(error = %e, "Failed to list directory for clearing");
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                continue;
            }
        };

        let file_path = entry.path();
        if !file_path.is_file() {
            continue;
        }

        match fs::remove_file(&file_path) {
            Ok(()) => debug!(file = %file_path.display(), "Removed file"),
            Err(e) => warn!(file = %file_path.display(), error = %e, "Error removing file"),
        }
    }
}

/// Reduce a client-supplied file name to its final component.
///
/// Returns `None` for names that do not name a file (empty, `.`, `..`, trailing separator).
pub fn sanitize_file_name(name: &str) -> Option<String> {
    // Browsers on Windows may send the full client path
    let last = name.rsplit(['/', '\\']).next()?;
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Output file name for an uploaded file: same base name, `.py` extension.
pub fn output_file_name(input_name: &str) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(input_name);
    format!("{stem}.{OUTPUT_EXTENSION}")
}

/// The (input, output) files written by one upload conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl StoredArtifact {
    /// File name of the generated output, as used in download links.
    pub fn output_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Owner of the upload and output directories.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl Storage {
    /// Create the storage, ensuring both directories exist.
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let upload_dir = upload_dir.into();
        let output_dir = output_dir.into();
        ensure_directory(&upload_dir)?;
        ensure_directory(&output_dir)?;
        Ok(Self {
            upload_dir,
            output_dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Exclusive access to the directories for the duration of one upload.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Remove the previous artifact pair.
    pub fn clear(&self) {
        clear_directory(&self.upload_dir);
        clear_directory(&self.output_dir);
    }

    /// Persist uploaded bytes under their (sanitised) original name.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid file name: {file_name:?}")))?;
        // Recreated in case the directory was removed underneath us
        ensure_directory(&self.upload_dir)?;
        let path = self.upload_dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Write the generated text under the input's base name with the `.py` extension.
    pub async fn write_output(&self, input_path: &Path, text: &str) -> io::Result<StoredArtifact> {
        let input_name = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "input path has no file name"))?;
        ensure_directory(&self.output_dir)?;
        let output_path = self.output_dir.join(output_file_name(input_name));
        tokio::fs::write(&output_path, text).await?;
        Ok(StoredArtifact {
            input_path: input_path.to_path_buf(),
            output_path,
        })
    }

    /// Resolve a download name to a path inside the output directory.
    ///
    /// Only plain file names are accepted, never anything containing a separator.
    pub fn output_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return None;
        }
        Some(self.output_dir.join(name))
    }
}
