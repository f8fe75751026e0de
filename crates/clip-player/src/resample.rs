//! Clip resample stage.
//!
//! Uses Rubato to convert a decoded clip from its own rate to the output device rate.
//! The clip is processed in fixed input chunks followed by one partial tail chunk.

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::decode::DecodedClip;

/// Resample `clip` to `dst_rate`, returning interleaved samples with the clip's
/// channel count. Returns a copy when the rates already match.
pub fn resample_clip(clip: &DecodedClip, dst_rate: u32, chunk_frames: usize) -> Result<Vec<f32>> {
    if clip.rate == dst_rate {
        return Ok(clip.samples.clone());
    }
    if clip.rate == 0 || dst_rate == 0 || clip.channels == 0 {
        return Err(anyhow!(
            "cannot resample {}ch @ {} Hz to {} Hz",
            clip.channels,
            clip.rate,
            dst_rate
        ));
    }

    let channels = clip.channels;
    let f_ratio = dst_rate as f64 / clip.rate as f64;

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);
    let mut resampler: Box<dyn Resampler<f32>> = Box::new(Async::<f32>::new_sinc(
        f_ratio,
        1.1,
        &params,
        chunk_in_frames,
        channels,
        FixedAsync::Input,
    )?);

    let mut out_interleaved = vec![0.0f32; channels * resampler.output_frames_max()];
    let expected_frames = (clip.frames() as f64 * f_ratio).ceil() as usize;
    let mut out = Vec::with_capacity(expected_frames * channels + out_interleaved.len());

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    let chunk_samples = chunk_in_frames * channels;
    let mut chunks = clip.samples.chunks(chunk_samples).peekable();
    while let Some(chunk) = chunks.next() {
        let frames = chunk.len() / channels;
        if frames == 0 {
            break;
        }
        // A short final chunk is fed as a partial block.
        let is_tail = chunks.peek().is_none() && frames < chunk_in_frames;

        let padded;
        let input: &[f32] = if is_tail {
            let mut buf = chunk.to_vec();
            buf.resize(chunk_samples, 0.0);
            padded = buf;
            &padded
        } else {
            chunk
        };

        let input_adapter = InterleavedSlice::new(input, channels, chunk_in_frames)
            .map_err(|e| anyhow!("interleaved slice (input): {e}"))?;
        let out_capacity_frames = out_interleaved.len() / channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut out_interleaved, channels, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved slice (output): {e}"))?;

        indexing.partial_len = if is_tail { Some(frames) } else { None };

        let (_nbr_in, nbr_out) =
            resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))?;
        out.extend_from_slice(&out_interleaved[..nbr_out * channels]);
    }

    tracing::debug!(
        from_hz = clip.rate,
        to_hz = dst_rate,
        in_frames = clip.frames(),
        out_frames = out.len() / channels,
        "clip resampled"
    );
    Ok(out)
}
