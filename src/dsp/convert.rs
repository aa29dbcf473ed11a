//! Raw ADC codes to calibrated (time, voltage) points.

use crate::config::BitMode;
use crate::dsp::{ScopeError, ScopeResult};
use crate::types::Sample;

/// Horizontal time grid shared by acquisitions and the math channel.
///
/// Sample `k` sits at `-5·div + (deficit + k)·step`, so a buffer shorter than
/// the configured sample count ends at `+5·div` instead of starting at `-5·div`.
/// Computing every time from the same expression keeps grids bit-identical
/// between channels built from the same sample count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeBase {
    time_div: f64,
    step: f64,
    deficit: i64,
}

impl TimeBase {
    pub fn new(time_div: f64, sample_count: u32, present: usize) -> ScopeResult<Self> {
        if sample_count <= 1 {
            return Err(ScopeError::InsufficientSamples);
        }
        let step = 10.0 * time_div / (sample_count as f64 - 1.0);
        Ok(Self {
            time_div,
            step,
            deficit: sample_count as i64 - present as i64,
        })
    }

    /// Like [`TimeBase::new`] but never starts left of `-5·div`.
    pub fn right_aligned(time_div: f64, sample_count: u32, present: usize) -> ScopeResult<Self> {
        let mut base = Self::new(time_div, sample_count, present)?;
        base.deficit = base.deficit.max(0);
        Ok(base)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn start(&self) -> f64 {
        -5.0 * self.time_div
    }

    pub fn end(&self) -> f64 {
        5.0 * self.time_div
    }

    pub fn time_at(&self, index: usize) -> f64 {
        self.start() + (self.deficit + index as i64) as f64 * self.step
    }
}

/// Converts one acquisition into plotted points.
///
/// Codes beyond the right edge of the display are dropped, a short buffer
/// simply yields a shorter curve.
pub fn convert(
    acquisition: &[u16],
    bit_mode: BitMode,
    voltage_div: f64,
    time_div: f64,
    sample_count: u32,
) -> ScopeResult<Vec<Sample>> {
    let base = TimeBase::right_aligned(time_div, sample_count, acquisition.len())?;
    let voltage_step = 10.0 * voltage_div / bit_mode.resolution();
    // Half a step of slack so rounding never drops the final in-range point.
    let limit = base.end() + base.step() * 0.5;

    let mut points = Vec::with_capacity(acquisition.len());
    for (index, &code) in acquisition.iter().enumerate() {
        let time = base.time_at(index);
        if time > limit {
            break;
        }
        let voltage = code as f64 * voltage_step - 5.0 * voltage_div;
        points.push(Sample::new(time, voltage));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_acquisition_spans_the_display() {
        let codes: Vec<u16> = (0..1001).map(|i| (i % 4096) as u16).collect();
        let points = convert(&codes, BitMode::Twelve, 1.0, 0.5, 1001).unwrap();
        assert_eq!(points.len(), 1001);
        let step = 10.0 * 0.5 / 1000.0;
        assert!((points[0].time + 2.5).abs() < 1e-12);
        assert!((points.last().unwrap().time - 2.5).abs() < step);
    }

    #[test]
    fn short_acquisition_is_right_aligned() {
        let codes = vec![0u16; 6];
        let points = convert(&codes, BitMode::Eight, 1.0, 1.0, 11).unwrap();
        assert_eq!(points.len(), 6);
        assert!((points[0].time - 0.0).abs() < 1e-12);
        assert!((points[5].time - 5.0).abs() < 1e-12);
    }

    #[test]
    fn every_length_up_to_sample_count_is_kept() {
        for len in 0..=50usize {
            let codes = vec![100u16; len];
            let points = convert(&codes, BitMode::Twelve, 0.2, 0.001, 50).unwrap();
            assert_eq!(points.len(), len);
        }
    }

    #[test]
    fn overlong_acquisition_is_truncated_at_right_edge() {
        let codes = vec![0u16; 30];
        let points = convert(&codes, BitMode::Eight, 1.0, 1.0, 11).unwrap();
        assert_eq!(points.len(), 11);
    }

    #[test]
    fn codes_map_onto_voltage_range() {
        let points = convert(&[0, 128, 256], BitMode::Eight, 2.0, 1.0, 3).unwrap();
        assert_eq!(points[0].voltage, -10.0);
        assert_eq!(points[1].voltage, 0.0);
        assert_eq!(points[2].voltage, 10.0);
    }

    #[test]
    fn single_sample_configuration_fails() {
        assert!(matches!(
            convert(&[1, 2], BitMode::Eight, 1.0, 1.0, 1),
            Err(ScopeError::InsufficientSamples)
        ));
    }
}
