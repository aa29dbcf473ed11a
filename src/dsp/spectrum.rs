use rustfft::{num_complex::Complex64, FftPlanner};

use crate::types::Sample;

/// Minimum change between bins that counts as a rise or a fall.
const EPSILON: f64 = 1e-6;
/// A later peak must beat a confirmed one by this factor to replace it.
const PEAK_RATIO: f64 = 1.2;

/// Unnormalised real-to-half-complex transform.
///
/// Output layout: `r0, r1, …, r(n/2), i((n+1)/2-1), …, i1`, i.e. the real
/// parts of the non-negative bins followed by the imaginary parts in reverse.
pub fn real_to_halfcomplex(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex64> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft.process(&mut buffer);

    let mut packed = vec![0.0; n];
    for k in 0..=n / 2 {
        packed[k] = buffer[k].re;
    }
    for k in 1..(n + 1) / 2 {
        packed[n - k] = buffer[k].im;
    }
    packed
}

/// Magnitudes of bins `0..=n/2` from a half-complex spectrum.
pub fn halfcomplex_magnitudes(packed: &[f64]) -> Vec<f64> {
    let n = packed.len();
    (0..=n / 2)
        .take(n)
        .map(|k| {
            let re = packed[k];
            // Bin 0 and, for even n, bin n/2 are purely real.
            let im = if k == 0 || 2 * k == n { 0.0 } else { packed[n - k] };
            (re * re + im * im).sqrt()
        })
        .collect()
}

/// Width of one frequency bin for a curve of `len` points.
///
/// `len` cancels out: the bin width only depends on the time division.
pub fn frequency_step(time_div: f64, len: usize) -> f64 {
    let n = len as f64;
    1.0 / (((time_div / 100.0) / n) * n)
}

/// Estimates the dominant frequency of a curve.
///
/// Walks bins `1..=n/2`, moving the candidate to any bin that rises above the
/// running maximum. Once the spectrum falls right after the candidate the peak
/// is confirmed, and from then on only bins at least 20% taller than that
/// peak can take over, which keeps a rising noise floor from winning.
pub fn find_dominant_frequency(samples: &[Sample], time_div: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let voltages: Vec<f64> = samples.iter().map(|s| s.voltage).collect();
    let magnitudes = halfcomplex_magnitudes(&real_to_halfcomplex(&voltages));
    let step = frequency_step(time_div, samples.len());

    match pick_peak_bin(&magnitudes) {
        Some(bin) => bin as f64 * step,
        None => 0.0,
    }
}

/// Index of the chosen bin, `None` when nothing rose above the floor.
pub fn pick_peak_bin(magnitudes: &[f64]) -> Option<usize> {
    let mut current_max = 0.0;
    let mut candidate: Option<usize> = None;
    let mut confirmed_peak: Option<f64> = None;

    for i in 1..magnitudes.len() {
        let magnitude = magnitudes[i];
        let beats_confirmed = confirmed_peak.map_or(true, |peak| magnitude > PEAK_RATIO * peak);
        if magnitude > current_max + EPSILON && beats_confirmed {
            current_max = magnitude;
            candidate = Some(i);
        }

        let falling = magnitude < magnitudes[i - 1] - EPSILON;
        if falling && candidate == Some(i - 1) {
            confirmed_peak = Some(magnitudes[i - 1]);
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    /// `len` points of a sine covering the window implied by `time_div`.
    fn sine(freq: f64, time_div: f64, len: usize) -> Vec<Sample> {
        let window = time_div / 100.0;
        (0..len)
            .map(|i| {
                let t = i as f64 * window / len as f64;
                Sample::new(t, (2.0 * PI * freq * t).sin())
            })
            .collect()
    }

    #[test]
    fn empty_curve_has_no_frequency() {
        assert_eq!(find_dominant_frequency(&[], 1.0), 0.0);
    }

    #[test]
    fn pure_sine_lands_on_its_bin() {
        let time_div = 1.0;
        let step = frequency_step(time_div, 1000);
        assert!((step - 100.0).abs() < 1e-9);
        let found = find_dominant_frequency(&sine(1000.0, time_div, 1000), time_div);
        assert!((found - 1000.0).abs() <= step, "found {found}");
    }

    #[test]
    fn noisy_sine_is_still_found() {
        let mut rng = StdRng::seed_from_u64(7);
        let time_div = 0.5;
        let mut samples = sine(2400.0, time_div, 2048);
        for s in &mut samples {
            s.voltage += rng.gen_range(-0.05..0.05);
        }
        let step = frequency_step(time_div, samples.len());
        let found = find_dominant_frequency(&samples, time_div);
        assert!((found - 2400.0).abs() <= step, "found {found}");
    }

    #[test]
    fn halfcomplex_layout_matches_definition() {
        let values = [1.0, 2.0, 0.0, -1.0, 0.5];
        let packed = real_to_halfcomplex(&values);
        let n = values.len();
        for k in 0..n {
            let (mut re, mut im) = (0.0, 0.0);
            for (j, v) in values.iter().enumerate() {
                let angle = -2.0 * PI * (k * j) as f64 / n as f64;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            if k <= n / 2 {
                assert!((packed[k] - re).abs() < 1e-9);
            }
            if k >= 1 && k < (n + 1) / 2 {
                assert!((packed[n - k] - im).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn confirmed_peak_resists_smaller_rise() {
        // Peak at bin 2, dip, then a bump that is taller but under 1.2×.
        let mags = [0.0, 1.0, 5.0, 2.0, 5.5, 1.0];
        assert_eq!(pick_peak_bin(&mags), Some(2));
        // A bump clearly above 1.2× takes over.
        let mags = [0.0, 1.0, 5.0, 2.0, 7.0, 1.0];
        assert_eq!(pick_peak_bin(&mags), Some(4));
    }

    #[test]
    fn monotonic_rise_keeps_last_bin() {
        let mags = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(pick_peak_bin(&mags), Some(4));
    }
}
