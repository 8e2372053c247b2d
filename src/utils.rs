use std::collections::HashMap;
use std::sync::OnceLock;
use regex::Regex;
use crate::api::{Album, Track};
use crate::errors::Result;
use log::info;

/// Sanitizes a filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Creates a directory if it doesn't exist
pub async fn ensure_dir_exists(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Generates a unique ID for queued jobs
pub fn generate_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Human readable byte count, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// `Title (Version)` when the release carries a version string.
pub fn format_title(title: &str, version: Option<&str>) -> String {
    match version.map(str::trim).filter(|v| !v.is_empty()) {
        Some(version) => format!("{} ({})", title.trim(), version),
        None => title.trim().to_string(),
    }
}

/// Width used for the ordinal prefix of archive entries.
pub fn ordinal_width(track_count: usize) -> usize {
    track_count.saturating_sub(1).to_string().len().max(2)
}

pub fn album_fields(album: &Album) -> HashMap<&'static str, String> {
    let mut fields = HashMap::new();
    fields.insert("name", format_title(&album.title, album.version.as_deref()));
    fields.insert("title", album.title.clone());
    fields.insert("album", album.title.clone());
    fields.insert("artists", album.artist.name.clone());
    fields.insert("album_artist", album.artist.name.clone());
    fields.insert("year", album.year().map(|y| y.to_string()).unwrap_or_default());
    fields.insert("upc", album.upc.clone().unwrap_or_default());
    fields.insert("label", album.label.as_ref().map(|l| l.name.clone()).unwrap_or_default());
    fields
}

pub fn track_fields(track: &Track, album: &Album) -> HashMap<&'static str, String> {
    let mut fields = album_fields(album);
    fields.insert("name", format_title(&track.title, track.version.as_deref()));
    fields.insert("title", track.title.clone());
    fields.insert("artists", track.artist_name(album).to_string());
    fields.insert("track_number", track.track_number.to_string());
    fields.insert("disc_number", track.media_number.to_string());
    fields.insert("isrc", track.isrc.clone().unwrap_or_default());
    fields
}

/// Fills `{placeholder}` slots; unknown placeholders are kept verbatim.
pub fn format_custom_title(template: &str, fields: &HashMap<&'static str, String>) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));

    placeholder
        .replace_all(template, |caps: &regex::Captures| {
            fields
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AlbumImage, ArtistRef, Performer};

    fn album() -> Album {
        Album {
            id: "0060254735180".to_string(),
            title: "Abbey Road".to_string(),
            version: Some("Remastered".to_string()),
            upc: Some("0602547351804".to_string()),
            artist: ArtistRef { id: 26390, name: "The Beatles".to_string() },
            image: AlbumImage::default(),
            release_date_original: Some("1969-09-26".to_string()),
            label: None,
            copyright: None,
            genre: None,
            tracks_count: 1,
            media_count: 1,
            tracks: None,
        }
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("AC/DC: Back in Black?"), "AC_DC_ Back in Black_");
        assert_eq!(sanitize_filename(" tab\there "), "tab_here");
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn ordinal_width_is_at_least_two() {
        assert_eq!(ordinal_width(0), 2);
        assert_eq!(ordinal_width(9), 2);
        assert_eq!(ordinal_width(101), 3);
    }

    #[test]
    fn templates_fill_known_fields() {
        let album = album();
        let track = Track {
            id: 1,
            title: "Come Together".to_string(),
            version: None,
            duration: 259,
            streamable: true,
            track_number: 1,
            media_number: 1,
            isrc: None,
            performer: Some(Performer { id: 1, name: "The Beatles".to_string() }),
        };

        let fields = track_fields(&track, &album);
        assert_eq!(format_custom_title("{track_number}. {artists} - {name}", &fields), "1. The Beatles - Come Together");
        assert_eq!(format_custom_title("{name} [{year}] {unknown}", &album_fields(&album)), "Abbey Road (Remastered) [1969] {unknown}");
    }
}
