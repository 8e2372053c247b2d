use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;
use crate::errors::{AppError, Result};

/// Real playing time of an encoded buffer, in seconds.
///
/// Uses the frame count from the codec parameters when the container declares
/// it, otherwise walks the packets to the end of the default track. Blocks
/// while decoding; async callers go through [`probe_duration_blocking`].
pub fn probe_duration<B>(bytes: B, extension: &str) -> Result<f64>
where
    B: AsRef<[u8]> + Send + Sync + 'static,
{
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AppError::Metadata(format!("Could not read audio stream: {}", e)))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| AppError::Metadata("No audio track found".to_string()))?;
    let track_id = track.id;
    let time_base = track
        .codec_params
        .time_base
        .or_else(|| track.codec_params.sample_rate.map(|rate| symphonia::core::units::TimeBase::new(1, rate)))
        .ok_or_else(|| AppError::Metadata("Stream has no time base".to_string()))?;

    if let Some(n_frames) = track.codec_params.n_frames {
        let time = time_base.calc_time(n_frames);
        return Ok(time.seconds as f64 + time.frac);
    }

    let mut end = 0u64;
    while let Ok(packet) = probed.format.next_packet() {
        if packet.track_id() == track_id {
            end = end.max(packet.ts() + packet.dur());
        }
    }

    let time = time_base.calc_time(end);
    Ok(time.seconds as f64 + time.frac)
}

struct SharedBuffer(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Runs [`probe_duration`] on the blocking pool and hands the buffer back.
pub async fn probe_duration_blocking(bytes: Vec<u8>, extension: &'static str) -> (Vec<u8>, Result<f64>) {
    let shared = Arc::new(bytes);
    let input = SharedBuffer(shared.clone());

    let measured = tokio::task::spawn_blocking(move || probe_duration(input, extension))
        .await
        .unwrap_or_else(|e| Err(AppError::Metadata(format!("Duration task failed: {}", e))));

    let bytes = Arc::try_unwrap(shared).unwrap_or_else(|still_shared| still_shared.as_ref().clone());
    (bytes, measured)
}

/// Duration guard. Both sides are compared in rounded whole seconds.
pub fn meets_expected_duration(actual_secs: f64, expected_secs: u64) -> bool {
    actual_secs.round() >= expected_secs as f64
}
