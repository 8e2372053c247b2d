use std::path::PathBuf;
use std::sync::Arc;
use crate::errors::Result;
use crate::saver::FileSaver;

/// User-facing notices.
pub trait Notifier: Send + Sync {
    fn info(&self, title: &str, description: Option<&str>);
    fn error(&self, message: &str, action: Option<NotifyAction>);
}

/// Follow-up the user can take on an error notice.
#[derive(Debug)]
pub enum NotifyAction {
    /// Copy the full diagnostic text.
    CopyDiagnostics { detail: String },
    /// Save a payload the pipeline held back.
    SaveAnyway(PendingSave),
}

/// A payload withheld from saving until the user confirms it.
pub struct PendingSave {
    bytes: Vec<u8>,
    file_name: String,
    saver: Arc<dyn FileSaver>,
}

impl PendingSave {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, saver: Arc<dyn FileSaver>) -> Self {
        Self { bytes, file_name: file_name.into(), saver }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub async fn confirm(self) -> Result<PathBuf> {
        self.saver.save(self.bytes, &self.file_name).await
    }
}

impl std::fmt::Debug for PendingSave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSave")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
