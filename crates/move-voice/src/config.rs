//! Configuration loading and merging.
//!
//! An optional TOML file supplies defaults; command-line flags override it.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use voice_queue::DEFAULT_PRIORITY;
use voice_queue::sequence::{DEFAULT_VOLUME, normalize_volume};

use crate::cli::Args;

pub const DEFAULT_CLIPS_DIR: &str = "mp3/";
pub const DEFAULT_EXTENSION: &str = "mp3";
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Config file schema. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    /// Base path prepended to clip ids.
    pub clips_dir: Option<String>,
    /// Clip file extension.
    pub extension: Option<String>,
    /// Playback volume in `[0, 1]`.
    pub volume: Option<f32>,
    /// Output device substring.
    pub device: Option<String>,
    /// Interaction prompt endpoint.
    pub notify_url: Option<String>,
    /// Timeout for interaction prompt requests.
    pub notify_timeout_ms: Option<u64>,
    /// Priority for events that do not name one.
    pub default_priority: Option<i32>,
    /// Resampler chunk size in frames.
    pub chunk_frames: Option<usize>,
}

impl VoiceConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<VoiceConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Fully resolved settings.
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceSettings {
    pub clips_dir: String,
    pub extension: String,
    pub volume: f32,
    pub device: Option<String>,
    pub notify_url: Option<String>,
    pub notify_timeout: Duration,
    pub default_priority: i32,
    pub chunk_frames: usize,
}

impl VoiceSettings {
    /// Merge CLI flags over the config file over built-in defaults.
    pub fn resolve(args: &Args, file: VoiceConfig) -> Self {
        Self {
            clips_dir: args
                .clips_dir
                .clone()
                .or(file.clips_dir)
                .unwrap_or_else(|| DEFAULT_CLIPS_DIR.to_string()),
            extension: args
                .extension
                .clone()
                .or(file.extension)
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            volume: normalize_volume(args.volume.or(file.volume).unwrap_or(DEFAULT_VOLUME)),
            device: normalize_name(args.device.clone().or(file.device)),
            notify_url: normalize_name(args.notify_url.clone().or(file.notify_url)),
            notify_timeout: Duration::from_millis(
                file.notify_timeout_ms.unwrap_or(DEFAULT_NOTIFY_TIMEOUT_MS),
            ),
            default_priority: file.default_priority.unwrap_or(DEFAULT_PRIORITY),
            chunk_frames: args
                .chunk_frames
                .or(file.chunk_frames)
                .unwrap_or(DEFAULT_CHUNK_FRAMES)
                .max(1),
        }
    }

    /// Load the config file named by `--config` (if any) and merge it with `args`.
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => VoiceConfig::load(path)?,
            None => VoiceConfig::default(),
        };
        Ok(Self::resolve(args, file))
    }
}

/// Blank strings mean "not set".
fn normalize_name(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
