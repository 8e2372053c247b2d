pub mod duration;
pub mod ffmpeg;

use tokio_util::sync::CancellationToken;
use crate::api::{Album, Track};
use crate::errors::Result;

pub use duration::{meets_expected_duration, probe_duration, probe_duration_blocking};
pub use ffmpeg::FfmpegEmbedder;

/// Tags, art and output codec for one track.
///
/// `embed` must return bytes in the configured output codec whether or not
/// tags were written. Every call gives up with `AppError::Canceled` once
/// `cancel` fires.
#[async_trait::async_trait]
pub trait MetadataEmbedder: Send + Sync {
    /// Makes the engine ready. Cheap when no processing is needed.
    async fn prepare(&self, cancel: &CancellationToken) -> Result<()>;

    async fn embed(
        &self,
        input: Vec<u8>,
        track: &Track,
        album: &Album,
        album_art: Option<&[u8]>,
        upc: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;

    /// Recomputes the FLAC stream MD5 signature.
    async fn repair_checksum(&self, input: Vec<u8>, cancel: &CancellationToken) -> Result<Vec<u8>>;
}
