//! Download jobs and the service that puts them on the queue.
//!
//! Every job runs on the [`JobQueue`] worker and reports through its
//! [`StatusWriter`](crate::downloader::StatusWriter). Errors never leave a
//! job: they are turned into a [`Settled`] value and a notice.

pub mod album;
pub mod discography;
pub mod track;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::api::{Album, CatalogApi, Track};
use crate::config::DownloadSettings;
use crate::downloader::{AlbumCache, JobHandle, JobIcon, JobQueue, Settled, Transfer};
use crate::errors::Result;
use crate::metadata::MetadataEmbedder;
use crate::notify::{Notifier, NotifyAction};
use crate::saver::FileSaver;
use crate::utils::format_title;

pub use discography::CategorySelection;

/// What a finished track job produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Saved(PathBuf),
    /// Held back because it plays shorter than the catalog says.
    ShortFile,
    NotStreamable,
}

/// Collaborators shared by every job.
pub(crate) struct Pipeline {
    pub(crate) catalog: Arc<dyn CatalogApi>,
    pub(crate) transfer: Arc<dyn Transfer>,
    pub(crate) embedder: Arc<dyn MetadataEmbedder>,
    pub(crate) saver: Arc<dyn FileSaver>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) albums: AlbumCache,
    pub(crate) settings: DownloadSettings,
}

impl Pipeline {
    /// The album with its track list, fetched at most once per cache lifetime.
    pub(crate) async fn full_album(&self, album: Arc<Album>, cancel: &CancellationToken) -> Result<Arc<Album>> {
        if album.tracks.is_some() {
            return Ok(album);
        }
        self.albums
            .get_or_fetch(&album.id, || self.catalog.album(&album.id, cancel))
            .await
    }

    /// Cover image for `album`. Anything short of cancellation just means no art.
    pub(crate) async fn album_art(&self, album: &Album, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        let Some(url) = album.art_url(self.settings.album_art_size) else {
            return Ok(None);
        };

        match self.transfer.fetch_bytes(&url, cancel, &mut |_: u64| {}).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_canceled() => Err(e),
            Err(e) => {
                log::warn!("Album art for '{}' unavailable: {}", album.title, e);
                Ok(None)
            }
        }
    }

    /// Tags, converts and, for FLAC, repairs the checksum.
    pub(crate) async fn finish_audio(
        &self,
        bytes: Vec<u8>,
        track: &Track,
        album: &Album,
        art: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let bytes = self
            .embedder
            .embed(bytes, track, album, art, album.upc.as_deref(), cancel)
            .await?;

        if self.settings.wants_md5_repair() {
            return self.embedder.repair_checksum(bytes, cancel).await;
        }
        Ok(bytes)
    }

    pub(crate) fn settle<T>(&self, label: &str, result: Result<T>, cancel: &CancellationToken) -> Settled {
        match result {
            Ok(_) => Settled::Ok,
            Err(e) if e.is_canceled() || cancel.is_cancelled() => {
                log::info!("'{}' canceled", label);
                Settled::Canceled
            }
            Err(e) => {
                log::error!("'{}' failed: {:?}", label, e);
                let message = e.to_string();
                self.notifier.error(
                    &message,
                    Some(NotifyAction::CopyDiagnostics { detail: format!("{}: {:?}", label, e) }),
                );
                Settled::Failed(message)
            }
        }
    }
}

/// Entry point for everything that ends up on the queue.
#[derive(Clone)]
pub struct DownloadService {
    queue: JobQueue,
    pipeline: Arc<Pipeline>,
}

impl DownloadService {
    pub fn new(
        queue: JobQueue,
        catalog: Arc<dyn CatalogApi>,
        transfer: Arc<dyn Transfer>,
        embedder: Arc<dyn MetadataEmbedder>,
        saver: Arc<dyn FileSaver>,
        notifier: Arc<dyn Notifier>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            queue,
            pipeline: Arc::new(Pipeline {
                catalog,
                transfer,
                embedder,
                saver,
                notifier,
                albums: AlbumCache::new(3600),
                settings,
            }),
        }
    }

    /// Replaces the default album cache. Call before enqueuing anything.
    pub fn with_album_cache(mut self, albums: AlbumCache) -> Self {
        if let Some(pipeline) = Arc::get_mut(&mut self.pipeline) {
            pipeline.albums = albums;
        }
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.pipeline.settings
    }

    /// Looks an album up outside of any job.
    pub async fn resolve_album(&self, album_id: &str) -> Result<Arc<Album>> {
        let cancel = CancellationToken::new();
        self.pipeline
            .albums
            .get_or_fetch(album_id, || self.pipeline.catalog.album(album_id, &cancel))
            .await
    }

    pub fn enqueue_track(&self, track: Track, album: Arc<Album>) -> JobHandle {
        let label = format_title(&track.title, track.version.as_deref());
        let pipeline = self.pipeline.clone();

        self.queue.enqueue(label.clone(), JobIcon::Track, move |ctx| async move {
            let result = track::download_track(&pipeline, &ctx, &track, &album).await;
            if let Ok(outcome) = &result {
                log::debug!("'{}' finished: {:?}", label, outcome);
            }
            pipeline.settle(&label, result, &ctx.cancel)
        })
    }

    /// One job that downloads every track and saves a single ZIP.
    pub fn enqueue_album(&self, album: Arc<Album>) -> JobHandle {
        let label = format_title(&album.title, album.version.as_deref());
        let pipeline = self.pipeline.clone();

        self.queue.enqueue(label.clone(), JobIcon::Album, move |ctx| async move {
            let result = album::download_album(&pipeline, &ctx, album).await;
            pipeline.settle(&label, result, &ctx.cancel)
        })
    }

    /// One track job per streamable track, each saved as its own file.
    pub async fn enqueue_album_tracks(&self, album: Arc<Album>) -> Result<Vec<JobHandle>> {
        let album = self.pipeline.full_album(album, &CancellationToken::new()).await?;

        let handles = album
            .track_items()
            .iter()
            .filter(|track| track.streamable)
            .map(|track| self.enqueue_track(track.clone(), album.clone()))
            .collect();
        Ok(handles)
    }

    /// Enqueues a ZIP job for every release in `selection`. The returned
    /// handles are not awaited here.
    pub async fn download_discography(&self, artist_id: u64, selection: CategorySelection) -> Result<Vec<JobHandle>> {
        discography::download_discography(self, artist_id, selection).await
    }

    pub fn notify_added(&self, title: &str) {
        self.pipeline.notifier.info(&format!("Added '{}'", title), None);
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn errors_settle_as_failed_with_diagnostics() {
        let harness = Harness::new(Vec::new());
        let cancel = CancellationToken::new();

        let settled = harness.pipeline().settle::<()>("job", Err(AppError::Network("502".into())), &cancel);

        assert_eq!(settled, Settled::Failed("Network error: 502".to_string()));
        let errors = harness.notifier.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].1, Some(NotifyAction::CopyDiagnostics { .. })));
    }

    #[tokio::test]
    async fn errors_after_cancel_are_silent() {
        let harness = Harness::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let settled = harness.pipeline().settle::<()>("job", Err(AppError::Network("reset".into())), &cancel);

        assert_eq!(settled, Settled::Canceled);
        assert!(harness.notifier.take_errors().is_empty());
    }

    #[tokio::test]
    async fn album_tracks_mode_enqueues_streamable_tracks_only() {
        let tracks = vec![
            track(1, 1, 1, 2.0),
            Track { streamable: false, ..track(2, 2, 1, 2.0) },
            track(3, 3, 1, 2.0),
        ];
        let harness = Harness::new(tracks);
        let service = harness.service();

        let handles = service.enqueue_album_tracks(harness.album_stub()).await.unwrap();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            assert_eq!(handle.await, Settled::Ok);
        }

        let mut saved = harness.saver.names();
        saved.sort();
        assert_eq!(saved, vec!["Band - Song 1.wav", "Band - Song 3.wav"]);
        assert_eq!(harness.catalog.album_fetches(), 1);
    }

    #[tokio::test]
    async fn added_notice_names_the_title() {
        let harness = Harness::new(Vec::new());
        harness.service().notify_added("Abbey Road");
        assert_eq!(harness.notifier.infos(), vec![("Added 'Abbey Road'".to_string(), None)]);
    }
}
