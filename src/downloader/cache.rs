use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use moka::future::Cache;
use crate::api::Album;
use crate::errors::Result;

const MAX_ALBUMS: u64 = 256;

/// Fully fetched albums, keyed by album id.
///
/// An album with its track list is expensive to resolve and is needed by
/// several callers (ZIP job, per-track jobs, the album view), so it is
/// fetched once and shared.
#[derive(Clone)]
pub struct AlbumCache {
    albums: Cache<String, Arc<Album>>,
}

impl AlbumCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            albums: Cache::builder()
                .max_capacity(MAX_ALBUMS)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build(),
        }
    }

    pub async fn get(&self, album_id: &str) -> Option<Arc<Album>> {
        self.albums.get(album_id).await
    }

    /// Only albums that carry their track list are worth keeping.
    pub async fn insert(&self, album: Album) -> Arc<Album> {
        let album = Arc::new(album);
        if album.tracks.is_some() {
            self.albums.insert(album.id.clone(), album.clone()).await;
        }
        album
    }

    pub async fn get_or_fetch<F, Fut>(&self, album_id: &str, fetch: F) -> Result<Arc<Album>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Album>>,
    {
        if let Some(album) = self.get(album_id).await {
            log::debug!("Album {} served from cache", album_id);
            return Ok(album);
        }

        let album = fetch().await?;
        Ok(self.insert(album).await)
    }

    pub async fn invalidate(&self, album_id: &str) {
        self.albums.invalidate(album_id).await;
    }
}
