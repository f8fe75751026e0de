//! Clip decode stage.
//!
//! Uses Symphonia to probe a clip and decode it completely into interleaved `f32`.
//! Clips are short, so the whole clip is held in memory instead of being streamed.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::max_clip_samples;

/// Metadata captured while probing the clip.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Container/extension hint (best-effort).
    pub container: Option<String>,
    /// Duration reported by the container, before any truncation.
    pub duration_ms: Option<u64>,
}

/// A fully decoded clip.
#[derive(Clone, Debug)]
pub struct DecodedClip {
    pub rate: u32,
    pub channels: usize,
    /// Interleaved samples.
    pub samples: Vec<f32>,
    pub info: SourceInfo,
}

impl DecodedClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Map a clip locator to a filesystem path. `file://` URIs lose their scheme.
pub fn path_from_locator(locator: &str) -> PathBuf {
    PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator))
}

/// Open and decode the clip at `locator`, using `extension` as the format hint.
pub fn decode_clip(locator: &str, extension: &str, max_seconds: f32) -> Result<DecodedClip> {
    let path = path_from_locator(locator);
    let file = File::open(&path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    let ext = if extension.is_empty() {
        path.extension().and_then(|e| e.to_str()).unwrap_or_default()
    } else {
        extension
    };
    if !ext.is_empty() {
        hint.with_extension(ext);
    }

    let mut clip = decode_clip_from_media_source(Box::new(file), hint, max_seconds)
        .with_context(|| format!("decode {:?}", path))?;
    if !ext.is_empty() {
        clip.info.container = Some(ext.to_ascii_uppercase());
    }
    Ok(clip)
}

/// Decode an arbitrary Symphonia [`MediaSource`] into memory.
pub fn decode_clip_from_media_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    max_seconds: f32,
) -> Result<DecodedClip> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let track_id = track.id;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let codec_params: CodecParameters = track.codec_params.clone();
    let info = SourceInfo {
        codec: codec_name_from_params(&codec_params),
        container: None,
        duration_ms: duration_ms_from_codec_params(&codec_params),
    };

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let cap = max_clip_samples(rate, channels, max_seconds);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());

        if samples.len() >= cap {
            samples.truncate(cap);
            tracing::debug!(cap_samples = cap, "clip truncated");
            break;
        }
    }

    if samples.is_empty() {
        return Err(anyhow!("clip contains no decodable audio"));
    }

    Ok(DecodedClip {
        rate,
        channels,
        samples,
        info,
    })
}

/// Best-effort duration in milliseconds from codec metadata.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
