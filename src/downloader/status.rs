use std::sync::Arc;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobIcon {
    Track,
    Album,
}

/// The one record the presentation layer draws from.
#[derive(Debug, Clone, Default)]
pub struct StatusSurface {
    pub job_id: Option<String>,
    pub icon: Option<JobIcon>,
    pub progress: u8,
    pub title: String,
    pub description: String,
    pub processing: bool,
    pub on_cancel: Option<CancellationToken>,
}

impl StatusSurface {
    pub(crate) fn started(job_id: &str, label: &str, icon: JobIcon) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            icon: Some(icon),
            progress: 0,
            title: label.to_string(),
            description: String::new(),
            processing: true,
            on_cancel: None,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        self.on_cancel.is_some()
    }
}

/// Write access to the surface on behalf of exactly one job.
///
/// A write lands only while the surface still belongs to this job, the job is
/// still processing and its token has not fired. Anything else is dropped.
#[derive(Clone)]
pub struct StatusWriter {
    job_id: String,
    sender: Arc<watch::Sender<StatusSurface>>,
    cancel: CancellationToken,
}

impl StatusWriter {
    pub(crate) fn new(job_id: String, sender: Arc<watch::Sender<StatusSurface>>, cancel: CancellationToken) -> Self {
        Self { job_id, sender, cancel }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Applies `change` and reports whether it was accepted.
    pub fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut StatusSurface),
    {
        if self.cancel.is_cancelled() {
            return false;
        }

        self.sender.send_if_modified(|surface| {
            let owns = surface.processing && surface.job_id.as_deref() == Some(self.job_id.as_str());
            if owns {
                change(surface);
            }
            owns
        })
    }

    pub fn set_title(&self, title: impl Into<String>) -> bool {
        let title = title.into();
        self.update(|s| s.title = title)
    }

    pub fn set_description(&self, description: impl Into<String>) -> bool {
        let description = description.into();
        self.update(|s| s.description = description)
    }

    pub fn set_progress(&self, progress: u8) -> bool {
        self.update(|s| s.progress = progress.min(100))
    }

    pub fn set_stage(&self, description: impl Into<String>, progress: u8) -> bool {
        let description = description.into();
        self.update(|s| {
            s.description = description;
            s.progress = progress.min(100);
        })
    }

    /// Exposes this job's token through the surface's cancel handler.
    pub fn arm_cancel(&self) -> bool {
        let token = self.cancel.clone();
        self.update(|s| s.on_cancel = Some(token))
    }
}

impl std::fmt::Debug for StatusWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusWriter").field("job_id", &self.job_id).finish()
    }
}

/// Percentage of `loaded` over `total`, floored and capped at 100.
pub fn percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((loaded as u128 * 100) / total as u128).min(100) as u8
}
