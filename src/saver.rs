use std::path::{Path, PathBuf};
use crate::errors::{AppError, Result};
use crate::utils::{ensure_dir_exists, sanitize_filename};

/// Hands a finished payload to the user.
#[async_trait::async_trait]
pub trait FileSaver: Send + Sync {
    /// Takes ownership of `bytes`; the buffer is released once written.
    async fn save(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf>;
}

/// Writes payloads into a download directory.
#[derive(Debug, Clone)]
pub struct DiskSaver {
    dir: PathBuf,
}

impl DiskSaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait::async_trait]
impl FileSaver for DiskSaver {
    async fn save(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf> {
        let name = sanitize_filename(file_name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(AppError::Validation(format!("Invalid file name: '{}'", file_name)));
        }

        ensure_dir_exists(&self.dir).await?;

        let target = self.dir.join(&name);
        let partial = self.dir.join(format!("{}.part", name));

        let size = bytes.len();
        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        log::info!("Saved {} ({} bytes)", target.display(), size);
        Ok(target)
    }
}
