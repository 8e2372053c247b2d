use std::path::PathBuf;
use std::sync::Mutex;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::watch;
use crate::config::{AppConfig, AudioCodec, AudioQuality};
use crate::downloader::{CategorySelection, JobIcon, StatusSurface};
use crate::notify::{Notifier, NotifyAction, PendingSave};

#[derive(Debug, Parser)]
#[command(name = "qobuz-dl", version, about = "Download Qobuz tracks, albums and discographies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// mp3_320, cd, hi_res_96 or hi_res_192
    #[arg(long, global = true)]
    pub quality: Option<AudioQuality>,

    /// flac, wav, alac, mp3, aac or opus
    #[arg(long, global = true)]
    pub codec: Option<AudioCodec>,

    /// Directory files are saved into
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Country whose token the API should use
    #[arg(long, global = true)]
    pub country: Option<String>,

    #[arg(long, global = true)]
    pub api_base: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a single track
    Track { album_id: String, track_id: String },
    /// Download an album as a ZIP archive
    Album {
        album_id: String,
        /// Save every track as its own file instead
        #[arg(long)]
        no_zip: bool,
    },
    /// Queue every release of an artist
    Artist {
        artist_id: String,
        /// all, album, ep-single, live or compilation
        #[arg(long, default_value = "all")]
        category: CategorySelection,
    },
}

impl Cli {
    /// Command line flags win over the config file and environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(quality) = self.quality {
            config.output_quality = quality;
        }
        if let Some(codec) = self.codec {
            config.output_codec = codec;
        }
        if let Some(output) = &self.output {
            config.download_path = output.clone();
        }
        if let Some(country) = &self.country {
            config.country = Some(country.clone());
        }
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
    }
}

pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Mirrors the status surface onto `bar` until the queue goes away.
pub async fn render(mut surface: watch::Receiver<StatusSurface>, bar: ProgressBar) {
    while surface.changed().await.is_ok() {
        let status = surface.borrow_and_update().clone();
        if !status.processing {
            continue;
        }

        bar.set_prefix(match status.icon {
            Some(JobIcon::Album) => "album",
            Some(JobIcon::Track) | None => "track",
        });
        bar.set_position(status.progress as u64);
        if status.description.is_empty() {
            bar.set_message(status.title);
        } else {
            bar.set_message(format!("{} | {}", status.title, status.description));
        }
    }
}

/// Prints notices above the progress bar and keeps held-back files until
/// the queue has drained.
pub struct ConsoleNotifier {
    bar: ProgressBar,
    pending: Mutex<Vec<PendingSave>>,
}

impl ConsoleNotifier {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar, pending: Mutex::new(Vec::new()) }
    }

    pub fn take_pending(&self) -> Vec<PendingSave> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn info(&self, title: &str, description: Option<&str>) {
        self.bar.suspend(|| match description {
            Some(description) => eprintln!("{}: {}", title, description),
            None => eprintln!("{}", title),
        });
    }

    fn error(&self, message: &str, action: Option<NotifyAction>) {
        self.bar.suspend(|| eprintln!("error: {}", message));
        match action {
            Some(NotifyAction::CopyDiagnostics { detail }) => log::debug!("{}", detail),
            Some(NotifyAction::SaveAnyway(pending)) => match self.pending.lock() {
                Ok(mut held) => held.push(pending),
                Err(poisoned) => poisoned.into_inner().push(pending),
            },
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["qobuz-dl", "album", "abc123", "--no-zip", "--codec", "mp3", "--quality", "cd", "-o", "/tmp/music"]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.output_codec, AudioCodec::Mp3);
        assert_eq!(config.output_quality, AudioQuality::Cd);
        assert_eq!(config.download_path, PathBuf::from("/tmp/music"));
        assert!(matches!(cli.command, Command::Album { no_zip: true, .. }));
    }

    #[test]
    fn artist_category_defaults_to_all() {
        let cli = Cli::parse_from(["qobuz-dl", "artist", "26390"]);
        assert!(matches!(cli.command, Command::Artist { category: CategorySelection::All, .. }));

        let cli = Cli::parse_from(["qobuz-dl", "artist", "26390", "--category", "live"]);
        assert!(matches!(
            cli.command,
            Command::Artist { category: CategorySelection::Only(crate::api::ReleaseCategory::Live), .. }
        ));
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!(Cli::try_parse_from(["qobuz-dl", "track", "a", "1", "--codec", "ape"]).is_err());
    }
}
