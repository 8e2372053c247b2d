pub mod cache;
pub mod http_pool;
pub mod jobs;
pub mod queue;
pub mod status;

use tokio_util::sync::CancellationToken;
use crate::errors::Result;

pub use cache::AlbumCache;
pub use http_pool::HttpPool;
pub use jobs::{CategorySelection, DownloadService, TrackOutcome};
pub use queue::{JobContext, JobHandle, JobQueue, Settled};
pub use status::{JobIcon, StatusSurface, StatusWriter};

/// Cancelable byte transfer primitive.
///
/// Once `cancel` fires, no further progress callback runs and the call
/// returns `AppError::Canceled`; bytes received so far are discarded.
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Size of the resource as reported by a metadata-only request.
    async fn probe_size(&self, url: &str, cancel: &CancellationToken) -> Result<u64>;

    /// Full body, reporting the running byte count after every chunk.
    async fn fetch_bytes(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<Vec<u8>>;
}
