//! CPAL-backed playback resources.
//!
//! [`CpalProvider::open`] resolves the output device and stream config on the calling
//! thread, then decodes and resamples the clip on a short-lived loader thread. The loader
//! hands the finished buffer back over a channel and reports `Ready`; the stream itself is
//! only built in [`PlaybackResource::start`], so a clip that is paused or dropped before
//! it is ready never touches the audio device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, TryRecvError};
use voice_queue::ClipReference;
use voice_queue::resource::{
    ClipEventSink, OpenError, PlaybackResource, ResourceProvider, StartError,
};

use crate::config::PlaybackConfig;
use crate::decode::decode_clip;
use crate::device::{output_config_for, pick_device};
use crate::playback::{ClipBuffer, ClipControl, build_clip_stream};
use crate::resample::resample_clip;

/// Opens clips on a CPAL output device.
#[derive(Clone, Debug, Default)]
pub struct CpalProvider {
    /// Case-insensitive substring of the output device name. `None` uses the default device.
    device: Option<String>,
    playback: PlaybackConfig,
}

impl CpalProvider {
    pub fn new(device: Option<String>, playback: PlaybackConfig) -> Self {
        Self { device, playback }
    }

    fn output(&self) -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
        let host = cpal::default_host();
        let device = pick_device(&host, self.device.as_deref())?;
        let config = output_config_for(&device, self.playback.target_rate)
            .context("select output config")?;
        Ok((device, config))
    }
}

impl ResourceProvider for CpalProvider {
    fn open(
        &self,
        clip: &ClipReference,
        events: ClipEventSink,
    ) -> Result<Box<dyn PlaybackResource>, OpenError> {
        let (device, supported) = self.output().map_err(|e| OpenError::Load {
            locator: clip.locator().to_string(),
            reason: format!("{e:#}"),
        })?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.config();

        let (buf_tx, buf_rx) = crossbeam_channel::bounded::<ClipBuffer>(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let locator = clip.locator().to_string();
        let extension = clip.extension().to_string();
        let dst_rate = stream_config.sample_rate;
        let playback = self.playback.clone();
        let cancelled_loader = cancelled.clone();
        let loader_events = events.clone();

        thread::Builder::new()
            .name("clip-loader".to_string())
            .spawn(move || {
                match load_clip(&locator, &extension, dst_rate, &playback) {
                    Ok(buffer) => {
                        if cancelled_loader.load(Ordering::Relaxed) {
                            return;
                        }
                        if buf_tx.send(buffer).is_ok() {
                            loader_events.ready();
                        }
                    }
                    Err(e) => {
                        tracing::warn!(locator = %locator, "clip load failed: {e:#}");
                        if !cancelled_loader.load(Ordering::Relaxed) {
                            loader_events.failed(format!("{e:#}"));
                        }
                    }
                }
            })
            .map_err(|e| OpenError::Load {
                locator: clip.locator().to_string(),
                reason: format!("spawn loader: {e}"),
            })?;

        tracing::debug!(
            locator = clip.locator(),
            rate = dst_rate,
            channels = stream_config.channels,
            format = ?sample_format,
            "clip opened"
        );

        Ok(Box::new(CpalClip {
            device,
            stream_config,
            sample_format,
            pending: buf_rx,
            cancelled,
            ctl: ClipControl::new(voice_queue::sequence::DEFAULT_VOLUME),
            events,
            stream: None,
        }))
    }
}

/// Decode `locator` and convert it to `dst_rate`.
fn load_clip(
    locator: &str,
    extension: &str,
    dst_rate: u32,
    playback: &PlaybackConfig,
) -> Result<ClipBuffer> {
    let clip = decode_clip(locator, extension, playback.max_clip_seconds)?;
    tracing::debug!(
        locator,
        codec = clip.info.codec.as_deref().unwrap_or("unknown"),
        container = clip.info.container.as_deref().unwrap_or("unknown"),
        duration_ms = clip.info.duration_ms,
        rate = clip.rate,
        channels = clip.channels,
        "clip decoded"
    );
    let samples = resample_clip(&clip, dst_rate, playback.chunk_frames)
        .with_context(|| format!("resample {locator}"))?;
    Ok(ClipBuffer {
        channels: clip.channels,
        samples,
    })
}

/// One clip bound to an output device.
struct CpalClip {
    device: cpal::Device,
    stream_config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    pending: Receiver<ClipBuffer>,
    cancelled: Arc<AtomicBool>,
    ctl: ClipControl,
    events: ClipEventSink,
    stream: Option<cpal::Stream>,
}

impl PlaybackResource for CpalClip {
    fn set_volume(&mut self, volume: f32) {
        self.ctl.volume.set(volume);
    }

    fn start(&mut self) -> Result<(), StartError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let buffer = match self.pending.try_recv() {
            Ok(buffer) => buffer,
            Err(TryRecvError::Empty) => {
                return Err(StartError::Blocked("clip is not loaded".to_string()));
            }
            Err(TryRecvError::Disconnected) => {
                return Err(StartError::Blocked("clip loader exited".to_string()));
            }
        };

        let stream = build_clip_stream(
            &self.device,
            &self.stream_config,
            self.sample_format,
            buffer,
            self.ctl.clone(),
            self.events.clone(),
        )
        .map_err(|e| StartError::Blocked(format!("{e:#}")))?;
        stream
            .play()
            .map_err(|e| StartError::Blocked(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn pause(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.ctl.paused.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                tracing::debug!("stream pause failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_clip_reports_missing_file() {
        let err = load_clip(
            "/nonexistent/piece/knight.mp3",
            "mp3",
            48_000,
            &PlaybackConfig::default(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("knight.mp3"));
    }

    #[test]
    fn provider_keeps_device_filter() {
        let provider = CpalProvider::new(Some("usb".to_string()), PlaybackConfig::default());
        assert_eq!(provider.device.as_deref(), Some("usb"));
        assert_eq!(provider.playback.chunk_frames, 1024);
    }
}
