use std::path::PathBuf;
use std::sync::Arc;
use crate::api::{Album, Track};
use crate::downloader::queue::JobContext;
use crate::downloader::status::percent;
use crate::errors::{AppError, Result};
use crate::processing::{build_archive, ArchiveEntry};
use crate::utils::{album_fields, format_bytes, format_custom_title, format_title, ordinal_width, track_fields};

use super::Pipeline;

struct Slot<'a> {
    track: &'a Track,
    url: String,
}

/// Archive position of every track, `None` for tracks that cannot be streamed.
///
/// Positions run across discs: the offset moves to the current slot count
/// whenever the disc number changes, and `track_number` is taken as-is within
/// a disc. Tracks are expected in server order.
pub fn flattened_positions(tracks: &[Track]) -> Vec<Option<usize>> {
    let mut disc = 1;
    let mut offset = 0;
    let mut slots = 0;

    tracks
        .iter()
        .map(|track| {
            if !track.streamable {
                return None;
            }
            if track.media_number != disc {
                disc = track.media_number;
                offset = slots;
            }
            let position = offset + (track.track_number as usize).saturating_sub(1);
            slots = slots.max(position + 1);
            Some(position)
        })
        .collect()
}

/// Downloads every streamable track of `album` and saves them as one ZIP.
pub(crate) async fn download_album(pipeline: &Pipeline, ctx: &JobContext, album: Arc<Album>) -> Result<PathBuf> {
    let status = &ctx.status;
    let cancel = &ctx.cancel;
    let settings = &pipeline.settings;

    status.set_title(format!("Downloading {}", format_title(&album.title, album.version.as_deref())));
    status.arm_cancel();

    status.set_description("Loading FFmpeg");
    pipeline.embedder.prepare(cancel).await?;

    status.set_stage("Fetching album data...", 0);
    let album = pipeline.full_album(album, cancel).await?;
    let tracks = album.track_items();
    let positions = flattened_positions(tracks);

    status.set_stage("Fetching album size...", 0);
    let mut slots: Vec<Option<Slot>> = Vec::new();
    let mut expected_total = 0u64;
    for (index, (track, position)) in tracks.iter().zip(&positions).enumerate() {
        let Some(position) = *position else {
            log::info!("Skipping '{}': not streamable", track.title);
            continue;
        };

        let url = pipeline
            .catalog
            .track_url(track.id, settings.quality.format_id(), cancel)
            .await?;
        expected_total += pipeline.transfer.probe_size(&url, cancel).await?;

        if slots.len() <= position {
            slots.resize_with(position + 1, || None);
        }
        if let Some(previous) = &slots[position] {
            log::warn!(
                "'{}' and '{}' share position {} in '{}', keeping the latter",
                previous.track.title,
                track.title,
                position + 1,
                album.title
            );
        }
        slots[position] = Some(Slot { track, url });
        status.set_progress(percent(index as u64 + 1, tracks.len() as u64));
    }
    log::info!("'{}': {} tracks, {} in total", album.title, slots.iter().flatten().count(), format_bytes(expected_total));

    status.set_stage("Fetching album art...", 0);
    let art = pipeline.album_art(&album, cancel).await?;

    let width = ordinal_width(tracks.len());
    let extension = settings.codec.extension();
    let mut entries = Vec::with_capacity(slots.len() + 1);
    if let Some(art) = &art {
        entries.push(ArchiveEntry::new("cover.jpg", art.clone()));
    }

    let mut downloaded = 0u64;
    for (position, slot) in slots.iter().enumerate() {
        let Some(slot) = slot else { continue };

        status.set_description(format!("Downloading {}", format_title(&slot.track.title, slot.track.version.as_deref())));
        let mut on_progress = |loaded: u64| {
            let received = downloaded + loaded;
            if received <= expected_total {
                status.set_progress(percent(received, expected_total));
            }
        };
        let bytes = pipeline.transfer.fetch_bytes(&slot.url, cancel, &mut on_progress).await?;
        downloaded += bytes.len() as u64;

        let bytes = pipeline.finish_audio(bytes, slot.track, &album, art.as_deref(), cancel).await?;
        let name = format_custom_title(&settings.track_name, &track_fields(slot.track, &album));
        entries.push(ArchiveEntry::new(
            format!("{:0width$} {}.{}", position + 1, name, extension, width = width),
            bytes,
        ));
    }

    status.set_stage("Zipping album...", 100);
    let archive = tokio::task::spawn_blocking(move || build_archive(&entries))
        .await
        .map_err(|e| AppError::Packaging(format!("Archive task failed: {}", e)))??;
    if cancel.is_cancelled() {
        return Err(AppError::Canceled);
    }

    status.set_progress(100);
    let zip_name = format!("{}.zip", format_custom_title(&settings.zip_name, &album_fields(&album)));
    pipeline.saver.save(archive, &zip_name).await
}
