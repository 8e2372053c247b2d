use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use crate::api::{Album, Track};
use crate::config::{AudioCodec, DownloadSettings};
use crate::errors::{AppError, Result};
use crate::metadata::MetadataEmbedder;
use crate::utils::format_title;

/// Embeds tags and art and converts codecs by shelling out to FFmpeg.
pub struct FfmpegEmbedder {
    ffmpeg_path: String,
    settings: DownloadSettings,
    ready: OnceCell<()>,
}

impl FfmpegEmbedder {
    pub fn new(ffmpeg_path: impl Into<String>, settings: DownloadSettings) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            settings,
            ready: OnceCell::new(),
        }
    }

    /// Runs FFmpeg to completion. The child is killed if `cancel` fires first.
    async fn run(&self, args: Vec<String>, cancel: &CancellationToken) -> Result<()> {
        log::debug!("Running {} {}", self.ffmpeg_path, args.join(" "));
        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Canceled),
            output = child => output,
        };
        let output = output.map_err(|e| AppError::Metadata(format!("Failed to start FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("FFmpeg failed: {}", stderr);
            return Err(AppError::Metadata(format!("FFmpeg exited with {}: {}", output.status, stderr.trim())));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetadataEmbedder for FfmpegEmbedder {
    async fn prepare(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.settings.needs_processing() {
            return Ok(());
        }

        self.ready
            .get_or_try_init(|| async {
                self.run(vec!["-hide_banner".to_string(), "-version".to_string()], cancel).await
            })
            .await
            .map(|_| ())
    }

    async fn embed(
        &self,
        input: Vec<u8>,
        track: &Track,
        album: &Album,
        album_art: Option<&[u8]>,
        upc: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if !self.settings.needs_processing() {
            return Ok(input);
        }

        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input");
        tokio::fs::write(&input_path, &input).await?;
        drop(input);

        let art_path = match album_art {
            Some(art) if self.settings.apply_metadata => {
                let path = workdir.path().join("cover.jpg");
                tokio::fs::write(&path, art).await?;
                Some(path)
            }
            _ => None,
        };

        let output_path = workdir.path().join(format!("output.{}", self.settings.codec.extension()));
        let tags = if self.settings.apply_metadata {
            track_tags(track, album, upc)
        } else {
            Vec::new()
        };

        let args = build_args(&input_path, art_path.as_deref(), &output_path, &tags, &self.settings);
        self.run(args, cancel).await?;

        Ok(tokio::fs::read(&output_path).await?)
    }

    async fn repair_checksum(&self, input: Vec<u8>, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input.flac");
        let output_path = workdir.path().join("output.flac");
        tokio::fs::write(&input_path, &input).await?;
        drop(input);

        let args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().into_owned(),
            "-map".to_string(),
            "0".to_string(),
            "-map_metadata".to_string(),
            "0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "flac".to_string(),
            output_path.to_string_lossy().into_owned(),
        ];
        self.run(args, cancel).await?;

        Ok(tokio::fs::read(&output_path).await?)
    }
}

/// Tag key/value pairs written for one track.
pub fn track_tags(track: &Track, album: &Album, upc: Option<&str>) -> Vec<(&'static str, String)> {
    let mut tags = vec![
        ("title", format_title(&track.title, track.version.as_deref())),
        ("artist", track.artist_name(album).to_string()),
        ("album", format_title(&album.title, album.version.as_deref())),
        ("album_artist", album.artist.name.clone()),
        ("track", format!("{}/{}", track.track_number, album.tracks_count.max(track.track_number))),
        ("disc", format!("{}/{}", track.media_number, album.media_count.max(track.media_number))),
    ];

    if let Some(year) = album.year() {
        tags.push(("date", year.to_string()));
    }
    if let Some(genre) = &album.genre {
        tags.push(("genre", genre.name.clone()));
    }
    if let Some(label) = &album.label {
        tags.push(("publisher", label.name.clone()));
    }
    if let Some(copyright) = &album.copyright {
        tags.push(("copyright", copyright.clone()));
    }
    if let Some(isrc) = &track.isrc {
        tags.push(("isrc", isrc.clone()));
    }
    if let Some(upc) = upc {
        tags.push(("barcode", upc.to_string()));
    }
    tags
}

fn supports_cover(codec: AudioCodec) -> bool {
    matches!(codec, AudioCodec::Flac | AudioCodec::Mp3 | AudioCodec::Alac | AudioCodec::Aac)
}

fn codec_args(settings: &DownloadSettings) -> Vec<String> {
    let bitrate = format!("{}k", settings.bitrate);
    let args: Vec<&str> = match settings.codec {
        AudioCodec::Flac => vec!["-c:a", "flac"],
        AudioCodec::Wav => vec!["-c:a", "pcm_s16le"],
        AudioCodec::Alac => vec!["-c:a", "alac"],
        AudioCodec::Mp3 => vec!["-c:a", "libmp3lame", "-b:a", bitrate.as_str(), "-id3v2_version", "3"],
        AudioCodec::Aac => vec!["-c:a", "aac", "-b:a", bitrate.as_str()],
        AudioCodec::Opus => vec!["-c:a", "libopus", "-b:a", bitrate.as_str()],
    };
    args.into_iter().map(str::to_string).collect()
}

/// FFmpeg command line for one embed/convert pass.
pub fn build_args(
    input: &Path,
    art: Option<&Path>,
    output: &Path,
    tags: &[(&'static str, String)],
    settings: &DownloadSettings,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into(), "-i".into(), path_arg(input)];

    let art = art.filter(|_| supports_cover(settings.codec));
    if let Some(art) = art {
        args.extend(["-i".to_string(), path_arg(art)]);
    }

    args.extend(["-map".to_string(), "0:a".to_string()]);
    if art.is_some() {
        args.extend([
            "-map".to_string(),
            "1:v".to_string(),
            "-c:v".to_string(),
            if settings.codec == AudioCodec::Flac { "copy" } else { "mjpeg" }.to_string(),
            "-disposition:v".to_string(),
            "attached_pic".to_string(),
        ]);
    }

    args.extend(codec_args(settings));

    for (key, value) in tags {
        args.push("-metadata".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(path_arg(output));
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
