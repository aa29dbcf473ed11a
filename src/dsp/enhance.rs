//! Optional bandpass enhancement for channel A.
//!
//! The curve is zero-stuffed up to a high rate, smoothed with a Butterworth
//! lowpass cascade, mixed with a carrier at the original sample rate and
//! passed through a bandpass cascade around [`BANDPASS_CENTRE_HZ`]. The stage
//! is best effort: whenever its parameters degenerate it returns `None` and
//! the caller keeps the plain curve.

use std::f64::consts::PI;

use log::{debug, warn};

use crate::types::Sample;

/// Upper bound of the upsampled rate.
pub const MAX_UPSAMPLED_HZ: f64 = 20_000_000.0;
/// Hard cap on the number of points the stage may produce.
pub const MAX_ENHANCED_SAMPLES: usize = 1_000_000;
pub const BANDPASS_CENTRE_HZ: f64 = 725_000.0;
pub const BANDPASS_WIDTH_HZ: f64 = 150_000.0;
const LOWPASS_ORDER: usize = 10;
const BANDPASS_SECTIONS: usize = 2;

#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

#[derive(Clone, Copy, Debug)]
struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }
}

#[derive(Default, Debug)]
struct Cascade {
    sections: Vec<BiquadFilter>,
}

impl Cascade {
    fn butterworth_lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let sections = (1..=order / 2)
            .map(|k| {
                let theta = (2 * k - 1) as f64 * PI / (2 * order) as f64;
                let q = 1.0 / (2.0 * theta.cos());
                BiquadFilter::new(lowpass(cutoff_hz, sample_rate_hz, q))
            })
            .collect();
        Self { sections }
    }

    fn bandpass(sections: usize, centre_hz: f64, width_hz: f64, sample_rate_hz: f64) -> Self {
        let q = centre_hz / width_hz;
        let sections = (0..sections)
            .map(|_| BiquadFilter::new(bandpass(centre_hz, sample_rate_hz, q)))
            .collect();
        Self { sections }
    }

    fn process_block(&mut self, samples: &mut [f64]) {
        for value in samples.iter_mut() {
            for section in &mut self.sections {
                *value = section.process(*value);
            }
        }
    }
}

fn lowpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn bandpass(centre_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * centre_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = alpha;
    let b1 = 0.0;
    let b2 = -alpha;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}

fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}

/// Integer upsampling ratio for `len` points spread over the display, capped
/// so the output stays under [`MAX_ENHANCED_SAMPLES`].
fn upsample_ratio(len: usize, time_div: f64) -> Option<(usize, f64)> {
    if len == 0 || !(time_div > 0.0) {
        return None;
    }
    let ideal_hz = if time_div > 50.0 {
        MAX_UPSAMPLED_HZ / (time_div / 50.0)
    } else {
        MAX_UPSAMPLED_HZ
    };
    let sample_rate_hz = len as f64 / (time_div / 100.0);
    let ratio = ((ideal_hz / sample_rate_hz) as usize).min(MAX_ENHANCED_SAMPLES / len);
    if ratio < 2 {
        return None;
    }
    Some((ratio, sample_rate_hz))
}

/// Runs the enhancement over an already converted curve.
pub fn bandpass_enhance(samples: &[Sample], time_div: f64) -> Option<Vec<Sample>> {
    let (ratio, sample_rate_hz) = upsample_ratio(samples.len(), time_div)?;
    let high_rate_hz = ratio as f64 * sample_rate_hz;
    let nyquist = high_rate_hz * 0.5;
    if BANDPASS_CENTRE_HZ + BANDPASS_WIDTH_HZ * 0.5 >= nyquist {
        warn!(
            "bandpass centre {BANDPASS_CENTRE_HZ} Hz is not below nyquist {nyquist} Hz, skipping enhancement"
        );
        return None;
    }

    let total = ratio * samples.len();
    let mut upsampled = vec![0.0; total];
    for (i, sample) in samples.iter().enumerate() {
        upsampled[i * ratio] = sample.voltage;
    }

    Cascade::butterworth_lowpass(LOWPASS_ORDER, nyquist / ratio as f64, high_rate_hz)
        .process_block(&mut upsampled);

    for (i, value) in upsampled.iter_mut().enumerate() {
        let carrier = ratio as f64 * (sample_rate_hz * (i as f64 / high_rate_hz) * 2.0 * PI).sin();
        *value *= carrier;
    }

    Cascade::bandpass(
        BANDPASS_SECTIONS,
        BANDPASS_CENTRE_HZ,
        BANDPASS_WIDTH_HZ,
        high_rate_hz,
    )
    .process_block(&mut upsampled);

    if upsampled.iter().any(|v| !v.is_finite()) {
        warn!("bandpass enhancement diverged, keeping the plain curve");
        return None;
    }

    let start = time_div * -5.0;
    let step = time_div * 10.0 / total as f64;
    debug!("bandpass enhancement: ratio {ratio}, {total} points");
    Some(
        upsampled
            .into_iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + i as f64 * step, v))
            .collect(),
    )
}
