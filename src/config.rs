use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use dirs;
use crate::errors::{AppError, Result};

const ENV_PREFIX: &str = "QOBUZ_DL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub country: Option<String>,
    pub download_path: PathBuf,
    pub output_quality: AudioQuality,
    pub output_codec: AudioCodec,
    pub bitrate: u32,
    pub apply_metadata: bool,
    pub fix_md5: bool,
    pub track_name: String,
    pub zip_name: String,
    pub album_art_size: u32,
    pub ffmpeg_path: String,
    pub album_cache_ttl_secs: u64,
    pub proxy: Option<String>,
}

/// Source quality requested from the catalog.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    #[serde(rename = "mp3_320")]
    Mp3_320,   // 5
    Cd,        // 6: 16-bit / 44.1 kHz
    #[serde(rename = "hi_res_96")]
    HiRes96,   // 7: 24-bit / up to 96 kHz
    #[serde(rename = "hi_res_192")]
    HiRes192,  // 27: 24-bit / up to 192 kHz
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Flac,
    Wav,
    Alac,
    Mp3,
    Aac,
    Opus,
}

impl AudioQuality {
    /// Format id understood by the signed-url endpoint.
    pub fn format_id(&self) -> &'static str {
        match self {
            AudioQuality::Mp3_320 => "5",
            AudioQuality::Cd => "6",
            AudioQuality::HiRes96 => "7",
            AudioQuality::HiRes192 => "27",
        }
    }
}

impl AudioCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioCodec::Flac => "flac",
            AudioCodec::Wav => "wav",
            AudioCodec::Alac => "m4a",
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "m4a",
            AudioCodec::Opus => "opus",
        }
    }
}

impl std::str::FromStr for AudioQuality {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mp3_320" | "5" => Ok(AudioQuality::Mp3_320),
            "cd" | "6" => Ok(AudioQuality::Cd),
            "hi_res_96" | "7" => Ok(AudioQuality::HiRes96),
            "hi_res_192" | "27" => Ok(AudioQuality::HiRes192),
            other => Err(AppError::Validation(format!("Unknown quality: {}", other))),
        }
    }
}

impl std::str::FromStr for AudioCodec {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "flac" => Ok(AudioCodec::Flac),
            "wav" => Ok(AudioCodec::Wav),
            "alac" => Ok(AudioCodec::Alac),
            "mp3" => Ok(AudioCodec::Mp3),
            "aac" => Ok(AudioCodec::Aac),
            "opus" => Ok(AudioCodec::Opus),
            other => Err(AppError::Validation(format!("Unknown codec: {}", other))),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:3000".to_string(),
            country: None,
            download_path: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("./downloads")),
            output_quality: AudioQuality::HiRes192,
            output_codec: AudioCodec::Flac,
            bitrate: 320,
            apply_metadata: true,
            fix_md5: false,
            track_name: "{artists} - {name}".to_string(),
            zip_name: "{artists} - {name}".to_string(),
            album_art_size: 3600,
            ffmpeg_path: "ffmpeg".to_string(),
            album_cache_ttl_secs: 3600,
            proxy: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the JSON file, then `QOBUZ_DL_*` environment variables.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            AppConfig::default().save()?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        let layered = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(layered.try_deserialize()?)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                std::fs::create_dir_all(config_dir)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config(config::ConfigError::Message("Could not find config directory".to_string())))?;

        Ok(config_dir.join("qobuz-dl").join("config.json"))
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            quality: self.output_quality,
            codec: self.output_codec,
            bitrate: self.bitrate,
            apply_metadata: self.apply_metadata,
            fix_md5: self.fix_md5,
            track_name: self.track_name.clone(),
            zip_name: self.zip_name.clone(),
            album_art_size: self.album_art_size,
        }
    }
}

/// The subset of settings a download job reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub quality: AudioQuality,
    pub codec: AudioCodec,
    pub bitrate: u32,
    pub apply_metadata: bool,
    pub fix_md5: bool,
    pub track_name: String,
    pub zip_name: String,
    pub album_art_size: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        AppConfig::default().download_settings()
    }
}

impl DownloadSettings {
    /// FFmpeg can be skipped when tags are off and the source already
    /// arrives in the requested codec.
    pub fn needs_processing(&self) -> bool {
        let source_matches = (self.quality == AudioQuality::HiRes192 && self.codec == AudioCodec::Flac)
            || (self.bitrate == 320 && self.codec == AudioCodec::Mp3);
        self.apply_metadata || !source_matches
    }

    pub fn wants_md5_repair(&self) -> bool {
        self.codec == AudioCodec::Flac && self.fix_md5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_source_matches_and_tags_are_off() {
        let settings = DownloadSettings {
            apply_metadata: false,
            ..DownloadSettings::default()
        };
        assert!(!settings.needs_processing());

        let mp3 = DownloadSettings {
            apply_metadata: false,
            codec: AudioCodec::Mp3,
            quality: AudioQuality::Mp3_320,
            ..DownloadSettings::default()
        };
        assert!(!mp3.needs_processing());
    }

    #[test]
    fn tagging_or_transcoding_needs_processing() {
        assert!(DownloadSettings::default().needs_processing());

        let alac = DownloadSettings {
            apply_metadata: false,
            codec: AudioCodec::Alac,
            ..DownloadSettings::default()
        };
        assert!(alac.needs_processing());
    }

    #[test]
    fn md5_repair_only_applies_to_flac() {
        let flac = DownloadSettings { fix_md5: true, ..DownloadSettings::default() };
        assert!(flac.wants_md5_repair());

        let mp3 = DownloadSettings { fix_md5: true, codec: AudioCodec::Mp3, ..DownloadSettings::default() };
        assert!(!mp3.wants_md5_repair());
    }

    #[test]
    fn quality_parses_names_and_format_ids() {
        assert_eq!("27".parse::<AudioQuality>().unwrap(), AudioQuality::HiRes192);
        assert_eq!("cd".parse::<AudioQuality>().unwrap(), AudioQuality::Cd);
        assert_eq!(AudioQuality::Mp3_320.format_id(), "5");
        assert!("lossy".parse::<AudioQuality>().is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "output_codec": "mp3", "bitrate": 256, "country": "FR" }"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.output_codec, AudioCodec::Mp3);
        assert_eq!(config.bitrate, 256);
        assert_eq!(config.country.as_deref(), Some("FR"));
        assert_eq!(config.track_name, "{artists} - {name}");
    }
}
