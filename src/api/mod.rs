pub mod client;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use crate::errors::Result;

pub use client::HttpCatalog;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performer {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumImage {
    pub small: Option<String>,
    pub thumbnail: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Expected duration in whole seconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub streamable: bool,
    #[serde(default = "default_number")]
    pub track_number: u32,
    #[serde(default = "default_number")]
    pub media_number: u32,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub performer: Option<Performer>,
}

fn default_number() -> u32 {
    1
}

impl Track {
    pub fn artist_name<'a>(&'a self, album: &'a Album) -> &'a str {
        self.performer
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(album.artist.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackList {
    pub items: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
    pub artist: ArtistRef,
    #[serde(default)]
    pub image: AlbumImage,
    #[serde(default)]
    pub release_date_original: Option<String>,
    #[serde(default)]
    pub label: Option<Label>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub genre: Option<Genre>,
    #[serde(default)]
    pub tracks_count: u32,
    #[serde(default)]
    pub media_count: u32,
    /// Present only once the full album has been fetched.
    #[serde(default)]
    pub tracks: Option<TrackList>,
}

impl Album {
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.release_date_original
            .as_deref()
            .and_then(|date| chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
            .map(|date| date.year())
    }

    pub fn track_items(&self) -> &[Track] {
        self.tracks.as_ref().map(|t| t.items.as_slice()).unwrap_or(&[])
    }

    /// Image URL of the variant closest to `size` pixels.
    pub fn art_url(&self, size: u32) -> Option<String> {
        let large = self.image.large.as_deref()?;
        let (stem, _) = large.rsplit_once('_')?;
        let variant = match size {
            0..=50 => "50",
            51..=230 => "230",
            231..=600 => "600",
            _ => "org",
        };
        Some(format!("{}_{}.jpg", stem, variant))
    }
}

/// Fixed set of release groups an artist page is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseCategory {
    Album,
    EpSingle,
    Live,
    Compilation,
}

impl ReleaseCategory {
    pub const ALL: [ReleaseCategory; 4] = [
        ReleaseCategory::Album,
        ReleaseCategory::EpSingle,
        ReleaseCategory::Live,
        ReleaseCategory::Compilation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReleaseCategory::Album => "albums",
            ReleaseCategory::EpSingle => "EPs & singles",
            ReleaseCategory::Live => "live albums",
            ReleaseCategory::Compilation => "compilations",
        }
    }

    /// Value of the `release_type` query parameter.
    pub fn api_value(&self) -> &'static str {
        match self {
            ReleaseCategory::Album => "album",
            ReleaseCategory::EpSingle => "epSingle",
            ReleaseCategory::Live => "live",
            ReleaseCategory::Compilation => "compilation",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleasePage {
    #[serde(default)]
    pub items: Vec<Album>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistReleases {
    #[serde(default)]
    pub album: ReleasePage,
    #[serde(default, rename = "epSingle")]
    pub ep_single: ReleasePage,
    #[serde(default)]
    pub live: ReleasePage,
    #[serde(default)]
    pub compilation: ReleasePage,
}

impl ArtistReleases {
    pub fn page_mut(&mut self, category: ReleaseCategory) -> &mut ReleasePage {
        match category {
            ReleaseCategory::Album => &mut self.album,
            ReleaseCategory::EpSingle => &mut self.ep_single,
            ReleaseCategory::Live => &mut self.live,
            ReleaseCategory::Compilation => &mut self.compilation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistName {
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: ArtistName,
    #[serde(default)]
    pub releases: ArtistReleases,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistResults {
    pub artist: Artist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// Remote catalog. Every call takes the owning job's token so an abort
/// interrupts the request in flight.
#[async_trait::async_trait]
pub trait CatalogApi: Send + Sync {
    async fn album(&self, album_id: &str, cancel: &CancellationToken) -> Result<Album>;
    async fn artist(&self, artist_id: u64, cancel: &CancellationToken) -> Result<ArtistResults>;
    async fn releases(
        &self,
        artist_id: u64,
        category: ReleaseCategory,
        offset: usize,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<ReleasePage>;
    async fn track_url(&self, track_id: u64, quality: &str, cancel: &CancellationToken) -> Result<String>;
}
