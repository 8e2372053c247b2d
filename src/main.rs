use std::sync::Arc;
use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use qobuz_dl::api::HttpCatalog;
use qobuz_dl::cli::{self, Cli, Command, ConsoleNotifier};
use qobuz_dl::config::AppConfig;
use qobuz_dl::downloader::{AlbumCache, DownloadService, HttpPool, JobHandle, JobQueue, Settled};
use qobuz_dl::metadata::FfmpegEmbedder;
use qobuz_dl::saver::DiskSaver;
use qobuz_dl::utils::format_title;
use qobuz_dl::validation::InputValidator;

const MAX_CONNECTIONS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            AppConfig::default()
        }
    };
    cli.apply(&mut config);

    let validator = InputValidator::new();
    validator.validate_output_dir(&config.download_path)?;

    let mut pool = HttpPool::new(MAX_CONNECTIONS)?;
    if let Some(proxy_url) = &config.proxy {
        info!("Using proxy: {}", proxy_url);
        pool = pool.with_proxy(proxy_url)?;
    }
    let catalog = HttpCatalog::new(&config.api_base, config.country.clone())?
        .with_client(pool.get_client().clone());

    let settings = config.download_settings();
    let bar = cli::progress_bar();
    let notifier = Arc::new(ConsoleNotifier::new(bar.clone()));
    let queue = JobQueue::new();

    let service = DownloadService::new(
        queue.clone(),
        Arc::new(catalog),
        Arc::new(pool),
        Arc::new(FfmpegEmbedder::new(config.ffmpeg_path.clone(), settings.clone())),
        Arc::new(DiskSaver::new(config.download_path.clone())),
        notifier.clone(),
        settings,
    )
    .with_album_cache(AlbumCache::new(config.album_cache_ttl_secs));

    let renderer = tokio::spawn(cli::render(queue.subscribe(), bar.clone()));

    let interrupt_queue = queue.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !interrupt_queue.cancel_active() {
                info!("Nothing to cancel, exiting");
                std::process::exit(130);
            }
        }
    });

    let handles = enqueue(&service, &validator, cli.command).await?;

    let mut failed = 0;
    for handle in handles {
        if let Settled::Failed(reason) = handle.await {
            log::debug!("Job failed: {}", reason);
            failed += 1;
        }
    }

    renderer.abort();
    bar.finish_and_clear();

    confirm_held_back(&notifier).await?;

    if failed > 0 {
        return Err(anyhow!("{} download(s) failed", failed));
    }
    Ok(())
}

async fn enqueue(service: &DownloadService, validator: &InputValidator, command: Command) -> anyhow::Result<Vec<JobHandle>> {
    match command {
        Command::Track { album_id, track_id } => {
            validator.validate_catalog_id(&album_id)?;
            let track_id = validator.validate_numeric_id(&track_id)?;

            let album = service
                .resolve_album(&album_id)
                .await
                .with_context(|| format!("failed to fetch album {}", album_id))?;
            let track = album
                .track_items()
                .iter()
                .find(|track| track.id == track_id)
                .cloned()
                .ok_or_else(|| anyhow!("track {} is not part of album {}", track_id, album_id))?;

            service.notify_added(&format_title(&track.title, track.version.as_deref()));
            Ok(vec![service.enqueue_track(track, album)])
        }
        Command::Album { album_id, no_zip } => {
            validator.validate_catalog_id(&album_id)?;

            let album = service
                .resolve_album(&album_id)
                .await
                .with_context(|| format!("failed to fetch album {}", album_id))?;
            let title = format_title(&album.title, album.version.as_deref());

            let handles = if no_zip {
                service.enqueue_album_tracks(album).await?
            } else {
                vec![service.enqueue_album(album)]
            };
            service.notify_added(&title);
            Ok(handles)
        }
        Command::Artist { artist_id, category } => {
            let artist_id = validator.validate_numeric_id(&artist_id)?;
            Ok(service.download_discography(artist_id, category).await?)
        }
    }
}

/// Offers every file that was held back for being too short.
async fn confirm_held_back(notifier: &ConsoleNotifier) -> anyhow::Result<()> {
    let pending = notifier.take_pending();
    if pending.is_empty() {
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for held in pending {
        eprint!("Save '{}' anyway? [y/N] ", held.file_name());
        let answer = lines.next_line().await?.unwrap_or_default();
        if answer.trim().eq_ignore_ascii_case("y") {
            let path = held.confirm().await?;
            info!("Saved {}", path.display());
        }
    }
    Ok(())
}
