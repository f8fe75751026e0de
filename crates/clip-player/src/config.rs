/// Tuning parameters shared by the decode/resample/output stages of a clip.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Decoded audio beyond this length is dropped.
    pub max_clip_seconds: f32,
    /// Preferred output sample rate. `None` uses the device default config.
    pub target_rate: Option<u32>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            max_clip_seconds: 10.0,
            target_rate: None,
        }
    }
}

/// Cap in **samples** for a clip decoded at `(rate, channels)`.
///
/// Non-finite or non-positive `max_seconds` falls back to 10 seconds.
pub fn max_clip_samples(rate_hz: u32, channels: usize, max_seconds: f32) -> usize {
    let secs = if max_seconds.is_finite() && max_seconds > 0.0 {
        max_seconds
    } else {
        10.0
    };

    let frames = (rate_hz as f32 * secs).ceil() as usize;
    frames.saturating_mul(channels)
}
