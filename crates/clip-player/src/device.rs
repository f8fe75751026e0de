//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for listing output devices, picking one by
//! case-insensitive substring, and choosing an output config for clip playback.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle`, or the host default.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle.filter(|n| !n.trim().is_empty()) else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("No default output device"));
    };

    host.output_devices()
        .context("No output devices")?
        .find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("No output device matched: {needle}"))
}

/// Output config for clip playback.
///
/// Without a target rate the device default config is used. With one, the supported
/// range closest to the target wins (see [`pick_rate_for_range`]).
pub fn output_config_for(
    device: &cpal::Device,
    target_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let Some(target) = target_rate else {
        return device
            .default_output_config()
            .context("default output config");
    };

    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;
    for range in device.supported_output_configs()? {
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target);
        let below = rate <= target;
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => {
                is_better_candidate((below, rate, rank), (*b_below, *b_rate, *b_rank))
            }
        };
        if replace {
            best = Some((below, rate, rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|(_, _, _, cfg)| cfg)
        .ok_or_else(|| anyhow!("No supported output configs"))
}

/// Print available output devices to stdout (for `--list-devices`).
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

/// Clamp `target` into `[min, max]`.
fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

/// Prefer rates at or below the target, then higher rates, then better sample formats.
fn is_better_candidate(candidate: (bool, u32, u8), best: (bool, u32, u8)) -> bool {
    let (below, rate, rank) = candidate;
    let (best_below, best_rate, best_rank) = best;
    if below != best_below {
        below
    } else if rate != best_rate {
        if below { rate > best_rate } else { rate < best_rate }
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
