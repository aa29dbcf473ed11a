use serde::{Deserialize, Serialize};

use crate::dsp::{ScopeError, ScopeResult};
use crate::types::{ChannelKind, Sample};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Fir,
    Iir,
}

/// Tap coefficients of a user-supplied difference equation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// "B" taps, applied to the input history.
    pub feedforward: Vec<f64>,
    /// "A" taps, applied to the output history. `feedback[0]` normalises.
    pub feedback: Vec<f64>,
    pub kind: FilterKind,
    /// Channel the filter reads from.
    pub source: ChannelKind,
}

impl FilterSpec {
    pub fn fir(feedforward: Vec<f64>, source: ChannelKind) -> Self {
        Self {
            feedforward,
            feedback: Vec::new(),
            kind: FilterKind::Fir,
            source,
        }
    }

    pub fn iir(feedforward: Vec<f64>, feedback: Vec<f64>, source: ChannelKind) -> Self {
        Self {
            feedforward,
            feedback,
            kind: FilterKind::Iir,
            source,
        }
    }

    /// FIR when no feedback taps are given, IIR otherwise.
    pub fn from_taps(feedforward: Vec<f64>, feedback: Vec<f64>, source: ChannelKind) -> Self {
        if feedback.is_empty() {
            Self::fir(feedforward, source)
        } else {
            Self::iir(feedforward, feedback, source)
        }
    }

    pub fn validate(&self) -> ScopeResult<()> {
        if self.feedforward.is_empty() {
            return Err(ScopeError::InvalidFilterSpec(
                "no feedforward taps".into(),
            ));
        }
        if self.kind == FilterKind::Iir {
            match self.feedback.first() {
                None => {
                    return Err(ScopeError::InvalidFilterSpec(
                        "IIR filter without feedback taps".into(),
                    ))
                }
                Some(&a0) if a0 == 0.0 => {
                    return Err(ScopeError::InvalidFilterSpec(
                        "first feedback tap must be non-zero".into(),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Runs the causal difference equation over `input`, keeping its time axis.
///
/// `y[n] = (Σ b[i]·x[n-i] - Σ_{j≥1} a[j]·y[n-j]) / a[0]`, with everything
/// before the first sample taken as zero.
pub fn apply(input: &[Sample], spec: &FilterSpec) -> ScopeResult<Vec<Sample>> {
    spec.validate()?;
    let b = &spec.feedforward;
    let mut output: Vec<Sample> = Vec::with_capacity(input.len());

    for n in 0..input.len() {
        let mut acc = 0.0;
        for (i, tap) in b.iter().enumerate().take(n + 1) {
            acc += tap * input[n - i].voltage;
        }

        if spec.kind == FilterKind::Iir {
            let a = &spec.feedback;
            for (j, tap) in a.iter().enumerate().skip(1).take(n) {
                acc -= tap * output[n - j].voltage;
            }
            acc /= a[0];
        }

        output.push(Sample::new(input[n].time, acc));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| Sample::new(i as f64 * 0.1 - 1.0, (i as f64).sin()))
            .collect()
    }

    #[test]
    fn unit_fir_is_identity() {
        let input = ramp(64);
        let output = apply(&input, &FilterSpec::fir(vec![1.0], ChannelKind::RawA)).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn moving_average_zero_pads_history() {
        let input: Vec<Sample> = (0..4).map(|i| Sample::new(i as f64, 3.0)).collect();
        let spec = FilterSpec::fir(vec![1.0 / 3.0; 3], ChannelKind::RawB);
        let output = apply(&input, &spec).unwrap();
        let expected = [1.0, 2.0, 3.0, 3.0];
        for (sample, want) in output.iter().zip(expected) {
            assert!((sample.voltage - want).abs() < 1e-12);
        }
        assert_eq!(output[3].time, 3.0);
    }

    #[test]
    fn one_pole_iir_matches_recurrence() {
        // y[n] = (x[n] + 0.5·y[n-1]) / 2
        let input: Vec<Sample> = (0..5).map(|i| Sample::new(i as f64, 1.0)).collect();
        let spec = FilterSpec::iir(vec![1.0], vec![2.0, -0.5], ChannelKind::RawA);
        let output = apply(&input, &spec).unwrap();
        let mut y_prev = 0.0;
        for (sample, out) in input.iter().zip(&output) {
            let y = (sample.voltage + 0.5 * y_prev) / 2.0;
            assert!((out.voltage - y).abs() < 1e-12);
            y_prev = y;
        }
    }

    #[test]
    fn zero_normaliser_is_rejected() {
        let spec = FilterSpec::iir(vec![1.0], vec![0.0, 0.3], ChannelKind::RawA);
        assert!(matches!(
            apply(&ramp(8), &spec),
            Err(ScopeError::InvalidFilterSpec(_))
        ));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let spec = FilterSpec::fir(vec![0.5, 0.5], ChannelKind::RawA);
        assert!(apply(&[], &spec).unwrap().is_empty());
    }
}
