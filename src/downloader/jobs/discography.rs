use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::api::{Album, CatalogApi, ReleaseCategory};
use crate::downloader::JobHandle;
use crate::errors::Result;
use crate::notify::NotifyAction;

use super::DownloadService;

const PAGE_SIZE: usize = 10;

/// Which release groups of an artist to queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySelection {
    All,
    Only(ReleaseCategory),
}

impl CategorySelection {
    pub fn categories(&self) -> Vec<ReleaseCategory> {
        match self {
            CategorySelection::All => ReleaseCategory::ALL.to_vec(),
            CategorySelection::Only(category) => vec![*category],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategorySelection::All => "releases",
            CategorySelection::Only(category) => category.label(),
        }
    }
}

impl std::str::FromStr for CategorySelection {
    type Err = crate::errors::AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "all" => Ok(CategorySelection::All),
            "album" | "albums" => Ok(CategorySelection::Only(ReleaseCategory::Album)),
            "ep-single" | "epsingle" | "ep_single" => Ok(CategorySelection::Only(ReleaseCategory::EpSingle)),
            "live" => Ok(CategorySelection::Only(ReleaseCategory::Live)),
            "compilation" | "compilations" => Ok(CategorySelection::Only(ReleaseCategory::Compilation)),
            other => Err(crate::errors::AppError::Validation(format!("Unknown release category: {}", other))),
        }
    }
}

/// Artist display name and every release in `selection`, pages exhausted.
pub async fn collect_releases(
    catalog: &dyn CatalogApi,
    artist_id: u64,
    selection: CategorySelection,
    cancel: &CancellationToken,
) -> Result<(String, Vec<Album>)> {
    let mut results = catalog.artist(artist_id, cancel).await?;
    let mut releases = Vec::new();

    for category in selection.categories() {
        let page = results.artist.releases.page_mut(category);
        while page.has_more {
            let next = catalog
                .releases(artist_id, category, page.items.len(), PAGE_SIZE, cancel)
                .await?;
            if next.items.is_empty() {
                log::warn!("Empty {} page for artist {} despite has_more", category.api_value(), artist_id);
                break;
            }
            page.items.extend(next.items);
            page.has_more = next.has_more;
        }
        log::debug!("Artist {}: {} {}", artist_id, page.items.len(), category.label());
        releases.append(&mut page.items);
    }

    Ok((results.artist.name.display, releases))
}

pub(crate) async fn download_discography(
    service: &DownloadService,
    artist_id: u64,
    selection: CategorySelection,
) -> Result<Vec<JobHandle>> {
    let notifier = &service.pipeline.notifier;
    let cancel = CancellationToken::new();

    let (artist, releases) = match collect_releases(service.pipeline.catalog.as_ref(), artist_id, selection, &cancel).await {
        Ok(found) => found,
        Err(e) => {
            log::error!("Fetching releases of artist {} failed: {}", artist_id, e);
            notifier.error(
                "Could not fetch artist data, check your token",
                Some(NotifyAction::CopyDiagnostics { detail: format!("{:?}", e) }),
            );
            return Err(e);
        }
    };

    let handles: Vec<JobHandle> = releases
        .into_iter()
        .map(|album| service.enqueue_album(Arc::new(album)))
        .collect();
    log::info!("Queued {} {} by {}", handles.len(), selection.label(), artist);

    notifier.info(
        &format!("Added all {} by '{}'", selection.label(), artist),
        Some("All releases have been added to the queue"),
    );
    Ok(handles)
}
