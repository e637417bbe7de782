use super::TARGET_RATE;
#[cfg(feature = "high-quality-audio")]
use crate::log_debug;
#[cfg(feature = "high-quality-audio")]
use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};

pub(super) const MIN_DEVICE_RATE: u32 = 2_000;
pub(super) const MAX_DEVICE_RATE: u32 = 384_000;
const MAX_LOW_PASS_TAPS: usize = 129;

#[cfg(feature = "high-quality-audio")]
static RESAMPLER_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);

/// Convert mono audio captured at `device_rate` to the recognizer rate.
pub fn resample_to_target_rate(input: &[f32], device_rate: u32) -> Vec<f32> {
    if input.is_empty() || device_rate == TARGET_RATE {
        return input.to_vec();
    }
    if !(MIN_DEVICE_RATE..=MAX_DEVICE_RATE).contains(&device_rate) {
        return input.to_vec();
    }

    #[cfg(feature = "high-quality-audio")]
    {
        match resample_with_rubato(input, device_rate) {
            Ok(output) => output,
            Err(err) => {
                if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                    log_debug(&format!(
                        "sinc resampler failed ({err}); falling back to linear resampling"
                    ));
                }
                basic_resample(input, device_rate)
            }
        }
    }

    #[cfg(not(feature = "high-quality-audio"))]
    {
        basic_resample(input, device_rate)
    }
}

#[cfg(feature = "high-quality-audio")]
fn resample_with_rubato(input: &[f32], device_rate: u32) -> Result<Vec<f32>> {
    let ratio = f64::from(TARGET_RATE) / f64::from(device_rate);
    let chunk = 256usize;
    let params = InterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.90,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk, 1)
        .map_err(|err| anyhow!("failed to build sinc resampler: {err:?}"))?;

    let expected = ((input.len() as f64) * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + chunk);
    let mut block = vec![0.0f32; chunk];
    for piece in input.chunks(chunk) {
        // Pad the final short block with its last sample to avoid a click.
        let pad = piece.last().copied().unwrap_or(0.0);
        block.fill(pad);
        block[..piece.len()].copy_from_slice(piece);
        let produced = resampler
            .process(std::slice::from_ref(&block), None)
            .map_err(|err| anyhow!("sinc resampler failed: {err:?}"))?;
        output.extend_from_slice(&produced[0]);
    }
    output.resize(expected, output.last().copied().unwrap_or(0.0));
    Ok(output)
}

/// Linear interpolation, preceded by a windowed-sinc low-pass when decimating.
pub(super) fn basic_resample(input: &[f32], device_rate: u32) -> Vec<f32> {
    let ratio = TARGET_RATE as f32 / device_rate as f32;
    if device_rate > TARGET_RATE {
        let taps = low_pass_taps(device_rate);
        let cutoff = (TARGET_RATE as f32 * 0.5 / device_rate as f32).min(0.499);
        resample_linear(&low_pass(input, cutoff, taps), ratio)
    } else {
        resample_linear(input, ratio)
    }
}

pub(super) fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let output_len = (input.len() as f32 * ratio).round() as usize;
    let last = input.last().copied().unwrap_or(0.0);
    (0..output_len)
        .map(|i| {
            let src = i as f32 / ratio;
            let idx = src.floor() as usize;
            let frac = src - idx as f32;
            match (input.get(idx), input.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                _ => last,
            }
        })
        .collect()
}

fn low_pass_taps(device_rate: u32) -> usize {
    let decimation = device_rate as f32 / TARGET_RATE as f32;
    let taps = ((decimation * 4.0).ceil() as usize).max(11) | 1;
    taps.min(MAX_LOW_PASS_TAPS)
}

fn low_pass(input: &[f32], normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let coeffs = low_pass_coefficients(normalized_cutoff, taps);
    let half = taps / 2;
    (0..input.len())
        .map(|n| {
            coeffs
                .iter()
                .enumerate()
                .filter_map(|(k, coeff)| {
                    (n + k)
                        .checked_sub(half)
                        .and_then(|idx| input.get(idx))
                        .map(|sample| sample * coeff)
                })
                .sum()
        })
        .collect()
}

/// Hamming-windowed sinc taps normalized to unity gain.
fn low_pass_coefficients(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let m = (taps.max(2) - 1) as f32;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|n| {
            let centered = n as f32 - m / 2.0;
            let sinc = if centered == 0.0 {
                2.0 * normalized_cutoff
            } else {
                (2.0 * PI * normalized_cutoff * centered).sin() / (PI * centered)
            };
            let window = 0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos();
            sinc * window
        })
        .collect();
    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        coeffs.iter_mut().for_each(|coeff| *coeff /= sum);
    }
    coeffs
}
