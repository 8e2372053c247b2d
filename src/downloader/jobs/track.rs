use crate::api::{Album, Track};
use crate::downloader::queue::JobContext;
use crate::downloader::status::percent;
use crate::errors::{AppError, Result};
use crate::metadata::{meets_expected_duration, probe_duration_blocking};
use crate::notify::{NotifyAction, PendingSave};
use crate::utils::{format_bytes, format_custom_title, format_title, track_fields};

use super::{Pipeline, TrackOutcome};

/// Fetches, tags and saves one track, holding it back if it plays short.
pub(crate) async fn download_track(
    pipeline: &Pipeline,
    ctx: &JobContext,
    track: &Track,
    album: &Album,
) -> Result<TrackOutcome> {
    let title = format_title(&track.title, track.version.as_deref());
    if !track.streamable {
        log::info!("Skipping '{}': not streamable", title);
        return Ok(TrackOutcome::NotStreamable);
    }

    let status = &ctx.status;
    let cancel = &ctx.cancel;
    let settings = &pipeline.settings;
    status.set_title(format!("Downloading {}", title));
    status.arm_cancel();

    status.set_description("Loading FFmpeg");
    pipeline.embedder.prepare(cancel).await?;

    status.set_stage("Fetching track size...", 0);
    let url = pipeline
        .catalog
        .track_url(track.id, settings.quality.format_id(), cancel)
        .await?;
    let size = pipeline.transfer.probe_size(&url, cancel).await?;
    log::debug!("'{}' is {} bytes", title, size);

    let total_label = format_bytes(size);
    let mut on_progress = |loaded: u64| {
        let description = format!("{} / {}", format_bytes(loaded), total_label);
        status.update(|s| {
            s.progress = percent(loaded, size);
            s.description = description;
        });
    };
    let bytes = pipeline.transfer.fetch_bytes(&url, cancel, &mut on_progress).await?;

    let art = if settings.apply_metadata {
        pipeline.album_art(album, cancel).await?
    } else {
        None
    };

    status.set_stage("Applying metadata...", 100);
    let bytes = pipeline.finish_audio(bytes, track, album, art.as_deref(), cancel).await?;
    if cancel.is_cancelled() {
        return Err(AppError::Canceled);
    }

    let extension = settings.codec.extension();
    let file_name = format!(
        "{}.{}",
        format_custom_title(&settings.track_name, &track_fields(track, album)),
        extension
    );

    let (bytes, measured) = probe_duration_blocking(bytes, extension).await;
    match measured {
        Ok(actual) if !meets_expected_duration(actual, track.duration) => {
            log::warn!("'{}' plays {:.1}s, expected {}s", title, actual, track.duration);
            pipeline.notifier.error(
                &format!(
                    "'{}' is shorter than expected ({}s instead of {}s) and was not saved. It may be a preview clip.",
                    title,
                    actual.round(),
                    track.duration
                ),
                Some(NotifyAction::SaveAnyway(PendingSave::new(bytes, file_name, pipeline.saver.clone()))),
            );
            return Ok(TrackOutcome::ShortFile);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Could not verify duration of '{}', saving anyway: {}", title, e),
    }

    let path = pipeline.saver.save(bytes, &file_name).await?;
    Ok(TrackOutcome::Saved(path))
}
