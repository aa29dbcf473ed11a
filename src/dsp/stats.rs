use serde::{Deserialize, Serialize};

use crate::types::Sample;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub max: f64,
    pub min: f64,
    pub peak_to_peak: f64,
    pub average: f64,
    pub std_dev: f64,
}

/// Measures a curve against the ±5 division display range.
///
/// Extremes are clipped to the range. The average includes samples on either
/// bound, the deviation excludes samples sitting exactly on the upper bound
/// but still divides by the average's count. Returns `None` for an empty
/// curve.
pub fn measure(samples: &[Sample], voltage_div: f64) -> Option<MeasurementResult> {
    let first = samples.first()?;
    let upper = voltage_div * 5.0;
    let lower = voltage_div * -5.0;

    let mut max = first.voltage;
    let mut min = first.voltage;
    let mut total = 0.0;
    let mut count = 0usize;
    for s in samples {
        max = max.max(s.voltage);
        min = min.min(s.voltage);
        if s.voltage <= upper && s.voltage >= lower {
            total += s.voltage;
            count += 1;
        }
    }

    let max = max.min(upper);
    let min = min.max(lower);
    if count == 0 {
        return Some(MeasurementResult {
            max,
            min,
            peak_to_peak: max - min,
            average: 0.0,
            std_dev: 0.0,
        });
    }

    let average = total / count as f64;
    let squares: f64 = samples
        .iter()
        .filter(|s| s.voltage < upper && s.voltage >= lower)
        .map(|s| (s.voltage - average).powi(2))
        .sum();

    Some(MeasurementResult {
        max,
        min,
        peak_to_peak: max - min,
        average,
        std_dev: (squares / count as f64).sqrt(),
    })
}
