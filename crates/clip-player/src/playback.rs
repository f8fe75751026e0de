//! Clip output stage (CPAL output stream).
//!
//! Builds a CPAL output stream over an in-memory clip. The callback:
//! - outputs silence while paused, without advancing
//! - applies the clip volume and basic channel mapping (mono↔stereo, best-effort otherwise)
//! - converts `f32` samples to the device sample format
//! - reports `Ended` exactly once, one callback after the last samples were handed to the
//!   device, or `Failed` on a stream error

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;
use voice_queue::resource::ClipEventSink;

/// Interleaved clip samples already at the output sample rate.
#[derive(Clone, Debug)]
pub struct ClipBuffer {
    pub channels: usize,
    pub samples: Vec<f32>,
}

/// `f32` volume shared between the owner and the audio callback.
#[derive(Clone, Debug)]
pub struct SharedVolume(Arc<AtomicU32>);

impl SharedVolume {
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(volume.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(volume.to_bits(), Ordering::Relaxed);
    }
}

/// Flags shared with the audio callback.
#[derive(Clone, Debug)]
pub struct ClipControl {
    pub paused: Arc<AtomicBool>,
    pub volume: SharedVolume,
    /// Set once `Ended` or `Failed` has been reported.
    pub finished: Arc<AtomicBool>,
}

impl ClipControl {
    pub fn new(volume: f32) -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            volume: SharedVolume::new(volume),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Build (but do not start) an output stream that plays `clip` once.
pub fn build_clip_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    clip: ClipBuffer,
    ctl: ClipControl,
    events: ClipEventSink,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, clip, ctl, events),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, clip, ctl, events),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, clip, ctl, events),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, clip, ctl, events),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    clip: ClipBuffer,
    ctl: ClipControl,
    events: ClipEventSink,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = (config.channels as usize).max(1);
    let src_channels = clip.channels.max(1);
    let samples = clip.samples;
    let mut pos = 0usize;
    let mut drain = DrainTracker::default();

    let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
    let ctl_cb = ctl.clone();
    let events_cb = events.clone();

    let err_ctl = ctl;
    let err_fn = move |err: cpal::StreamError| {
        tracing::warn!("clip stream error: {err}");
        if !err_ctl.finished.swap(true, Ordering::Relaxed) {
            events.failed(err.to_string());
        }
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if ctl_cb.paused.load(Ordering::Relaxed) {
                data.fill(silence);
                return;
            }

            let volume = ctl_cb.volume.get();
            for out_frame in data.chunks_mut(channels_out) {
                if pos + src_channels > samples.len() {
                    out_frame.fill(silence);
                    continue;
                }
                let frame = &samples[pos..pos + src_channels];
                for (ch, out) in out_frame.iter_mut().enumerate() {
                    let v = map_sample(frame, channels_out, ch) * volume;
                    *out = <T as cpal::Sample>::from_sample::<f32>(v);
                }
                pos += src_channels;
            }

            let exhausted = pos + src_channels > samples.len();
            if drain.should_report(exhausted) && !ctl_cb.finished.swap(true, Ordering::Relaxed) {
                events_cb.ended();
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Delays the end-of-clip report by one callback so the device plays out the buffer
/// that holds the final samples before the stream is dropped.
#[derive(Debug, Default)]
struct DrainTracker {
    drained: bool,
}

impl DrainTracker {
    /// Called once per callback with whether the clip is exhausted after it.
    fn should_report(&mut self, exhausted: bool) -> bool {
        if !exhausted {
            return false;
        }
        if self.drained {
            return true;
        }
        self.drained = true;
        false
    }
}

/// Sample for output channel `dst_ch` from one source frame.
///
/// Mapping rules:
/// - mono → any: duplicate channel 0
/// - stereo → mono: average L/R
/// - same layout: pass-through
/// - other layouts: clamp to the last available source channel
fn map_sample(frame: &[f32], dst_channels: usize, dst_ch: usize) -> f32 {
    let get = |ch: usize| frame.get(ch).copied().unwrap_or(0.0);
    match (frame.len(), dst_channels) {
        (1, _) => get(0),
        (2, 1) => 0.5 * (get(0) + get(1)),
        (n, _) => get(dst_ch.min(n.saturating_sub(1))),
    }
}
