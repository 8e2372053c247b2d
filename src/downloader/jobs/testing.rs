//! In-memory collaborators for job tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use crate::api::{
    Album, AlbumImage, Artist, ArtistName, ArtistRef, ArtistReleases, ArtistResults, CatalogApi,
    ReleaseCategory, ReleasePage, Track, TrackList,
};
use crate::config::{AudioCodec, DownloadSettings};
use crate::downloader::{AlbumCache, DownloadService, JobQueue, StatusSurface, Transfer};
use crate::errors::{AppError, Result};
use crate::metadata::duration::tests::wav;
use crate::metadata::MetadataEmbedder;
use crate::notify::{Notifier, NotifyAction};
use crate::saver::FileSaver;

use super::Pipeline;

pub(crate) const SAMPLE_RATE: u32 = 8000;

const COVER_LISTING: &str = "https://img.test/a1_600.jpg";
const COVER_FULL: &str = "https://img.test/a1_org.jpg";

pub(crate) fn track(id: u64, number: u32, disc: u32, seconds: f64) -> Track {
    Track {
        id,
        title: format!("Song {}", id),
        version: None,
        duration: seconds.round() as u64,
        streamable: true,
        track_number: number,
        media_number: disc,
        isrc: None,
        performer: None,
    }
}

pub(crate) fn album(id: &str, tracks: Option<Vec<Track>>) -> Album {
    Album {
        id: id.to_string(),
        title: "Record".to_string(),
        version: None,
        upc: Some("0000000000001".to_string()),
        artist: ArtistRef { id: 42, name: "Band".to_string() },
        image: AlbumImage::default(),
        release_date_original: Some("2020-01-01".to_string()),
        label: None,
        copyright: None,
        genre: None,
        tracks_count: tracks.as_ref().map(|t| t.len() as u32).unwrap_or(0),
        media_count: 1,
        tracks: tracks.map(|items| TrackList { items }),
    }
}

pub(crate) fn track_url(track_id: u64) -> String {
    format!("https://cdn.test/{}", track_id)
}

#[derive(Default)]
pub(crate) struct FakeCatalog {
    albums: Mutex<HashMap<String, Album>>,
    artist: Mutex<Option<ArtistResults>>,
    releases: Mutex<HashMap<ReleaseCategory, Vec<Album>>>,
    release_calls: Mutex<Vec<(ReleaseCategory, usize, usize)>>,
    album_fetches: AtomicUsize,
}

impl FakeCatalog {
    pub(crate) fn add_album(&self, album: Album) {
        self.albums.lock().unwrap().insert(album.id.clone(), album);
    }

    /// The artist page carries the first `first_page` releases of each category.
    pub(crate) fn set_artist(&self, name: &str, releases: HashMap<ReleaseCategory, Vec<Album>>, first_page: usize) {
        let mut pages = ArtistReleases::default();
        for (category, items) in &releases {
            let page = pages.page_mut(*category);
            page.items = items.iter().take(first_page).cloned().collect();
            page.has_more = items.len() > first_page;
        }

        *self.artist.lock().unwrap() = Some(ArtistResults {
            artist: Artist {
                id: 42,
                name: ArtistName { display: name.to_string() },
                releases: pages,
            },
        });
        *self.releases.lock().unwrap() = releases;
    }

    pub(crate) fn album_fetches(&self) -> usize {
        self.album_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn release_calls(&self) -> Vec<(ReleaseCategory, usize, usize)> {
        self.release_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn album(&self, album_id: &str, _cancel: &CancellationToken) -> Result<Album> {
        self.album_fetches.fetch_add(1, Ordering::SeqCst);
        self.albums
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("album {}", album_id)))
    }

    async fn artist(&self, _artist_id: u64, _cancel: &CancellationToken) -> Result<ArtistResults> {
        self.artist
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Network("401 Unauthorized".to_string()))
    }

    async fn releases(
        &self,
        _artist_id: u64,
        category: ReleaseCategory,
        offset: usize,
        limit: usize,
        _cancel: &CancellationToken,
    ) -> Result<ReleasePage> {
        self.release_calls.lock().unwrap().push((category, offset, limit));
        let all = self.releases.lock().unwrap().get(&category).cloned().unwrap_or_default();
        let items: Vec<Album> = all.iter().skip(offset).take(limit).cloned().collect();
        Ok(ReleasePage {
            has_more: offset + items.len() < all.len(),
            items,
        })
    }

    async fn track_url(&self, track_id: u64, _quality: &str, _cancel: &CancellationToken) -> Result<String> {
        Ok(track_url(track_id))
    }
}

#[derive(Default)]
pub(crate) struct FakeTransfer {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    surface: Mutex<Option<watch::Receiver<StatusSurface>>>,
    progress_seen: Mutex<Vec<u8>>,
    hang: Mutex<Option<(String, oneshot::Sender<()>)>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeTransfer {
    pub(crate) fn set_body(&self, url: String, bytes: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url, bytes);
    }

    /// Records the surface progress after every progress callback.
    pub(crate) fn watch(&self, surface: watch::Receiver<StatusSurface>) {
        *self.surface.lock().unwrap() = Some(surface);
    }

    pub(crate) fn progress_seen(&self) -> Vec<u8> {
        self.progress_seen.lock().unwrap().clone()
    }

    pub(crate) fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Makes the fetch of `url` block until canceled; `reached` fires when it does.
    pub(crate) fn hang_on(&self, url: String) -> oneshot::Receiver<()> {
        let (reached, rx) = oneshot::channel();
        *self.hang.lock().unwrap() = Some((url, reached));
        rx
    }

    fn body(&self, url: &str) -> Result<Vec<u8>> {
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Network(format!("404 for {}", url)))
    }
}

#[async_trait::async_trait]
impl Transfer for FakeTransfer {
    async fn probe_size(&self, url: &str, cancel: &CancellationToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(AppError::Canceled);
        }
        Ok(self.body(url)?.len() as u64)
    }

    async fn fetch_bytes(
        &self,
        url: &str,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<Vec<u8>> {
        let hang = {
            let mut hang = self.hang.lock().unwrap();
            match hang.take() {
                Some((target, reached)) if target == url => Some(reached),
                other => {
                    *hang = other;
                    None
                }
            }
        };
        if let Some(reached) = hang {
            let _ = reached.send(());
            cancel.cancelled().await;
        }
        if cancel.is_cancelled() {
            return Err(AppError::Canceled);
        }

        let body = self.body(url)?;
        self.fetched.lock().unwrap().push(url.to_string());
        on_progress(body.len() as u64);

        if let Some(surface) = self.surface.lock().unwrap().as_ref() {
            let progress = surface.borrow().progress;
            self.progress_seen.lock().unwrap().push(progress);
        }
        Ok(body)
    }
}

/// Returns its input untouched, remembering the art it was handed and how
/// many checksum repairs were asked for.
#[derive(Default)]
pub(crate) struct RecordingEmbedder {
    arts: Mutex<Vec<Option<Vec<u8>>>>,
    repairs: AtomicUsize,
}

impl RecordingEmbedder {
    pub(crate) fn arts(&self) -> Vec<Option<Vec<u8>>> {
        self.arts.lock().unwrap().clone()
    }

    pub(crate) fn repairs(&self) -> usize {
        self.repairs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MetadataEmbedder for RecordingEmbedder {
    async fn prepare(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn embed(
        &self,
        input: Vec<u8>,
        _track: &Track,
        _album: &Album,
        album_art: Option<&[u8]>,
        _upc: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.arts.lock().unwrap().push(album_art.map(<[u8]>::to_vec));
        Ok(input)
    }

    async fn repair_checksum(&self, input: Vec<u8>, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.repairs.fetch_add(1, Ordering::SeqCst);
        Ok(input)
    }
}

#[derive(Default)]
pub(crate) struct RecordingSaver {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSaver {
    pub(crate) fn names(&self) -> Vec<String> {
        self.saved.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub(crate) fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FileSaver for RecordingSaver {
    async fn save(&self, bytes: Vec<u8>, file_name: &str) -> Result<PathBuf> {
        self.saved.lock().unwrap().push((file_name.to_string(), bytes));
        Ok(PathBuf::from(file_name))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    infos: Mutex<Vec<(String, Option<String>)>>,
    errors: Mutex<Vec<(String, Option<NotifyAction>)>>,
}

impl RecordingNotifier {
    pub(crate) fn infos(&self) -> Vec<(String, Option<String>)> {
        self.infos.lock().unwrap().clone()
    }

    pub(crate) fn take_errors(&self) -> Vec<(String, Option<NotifyAction>)> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, title: &str, description: Option<&str>) {
        self.infos
            .lock()
            .unwrap()
            .push((title.to_string(), description.map(str::to_string)));
    }

    fn error(&self, message: &str, action: Option<NotifyAction>) {
        self.errors.lock().unwrap().push((message.to_string(), action));
    }
}

/// Wires fakes around one album named "Record" by "Band", id `a1`.
pub(crate) struct Harness {
    pub(crate) catalog: Arc<FakeCatalog>,
    pub(crate) transfer: Arc<FakeTransfer>,
    pub(crate) embedder: Arc<RecordingEmbedder>,
    pub(crate) saver: Arc<RecordingSaver>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) queue: JobQueue,
    pub(crate) settings: DownloadSettings,
    tracks: Vec<Track>,
}

impl Harness {
    /// Every track's body is a WAV exactly as long as its listed duration.
    pub(crate) fn new(tracks: Vec<Track>) -> Self {
        let catalog = Arc::new(FakeCatalog::default());
        let transfer = Arc::new(FakeTransfer::default());

        for track in &tracks {
            transfer.set_body(track_url(track.id), wav(track.duration as f64, SAMPLE_RATE));
        }
        catalog.add_album(album("a1", Some(tracks.clone())));

        Self {
            catalog,
            transfer,
            embedder: Arc::new(RecordingEmbedder::default()),
            saver: Arc::new(RecordingSaver::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            queue: JobQueue::new(),
            settings: DownloadSettings {
                codec: AudioCodec::Wav,
                apply_metadata: false,
                ..DownloadSettings::default()
            },
            tracks,
        }
    }

    pub(crate) fn pipeline(&self) -> Pipeline {
        Pipeline {
            catalog: self.catalog.clone(),
            transfer: self.transfer.clone(),
            embedder: self.embedder.clone(),
            saver: self.saver.clone(),
            notifier: self.notifier.clone(),
            albums: AlbumCache::new(60),
            settings: self.settings.clone(),
        }
    }

    pub(crate) fn service(&self) -> DownloadService {
        DownloadService::new(
            self.queue.clone(),
            self.catalog.clone(),
            self.transfer.clone(),
            self.embedder.clone(),
            self.saver.clone(),
            self.notifier.clone(),
            self.settings.clone(),
        )
    }

    /// The album as a listing would return it, without tracks.
    pub(crate) fn album_stub(&self) -> Arc<Album> {
        Arc::new(album("a1", None))
    }

    pub(crate) fn full_album(&self) -> Arc<Album> {
        Arc::new(album("a1", Some(self.tracks.clone())))
    }

    /// Gives the catalog's album a cover. `body` is what the full-size image
    /// URL serves; `None` leaves it unreachable.
    pub(crate) fn with_cover(&self, body: Option<Vec<u8>>) {
        let mut full = album("a1", Some(self.tracks.clone()));
        full.image.large = Some(COVER_LISTING.to_string());
        self.catalog.add_album(full);
        if let Some(body) = body {
            self.transfer.set_body(COVER_FULL.to_string(), body);
        }
    }
}
