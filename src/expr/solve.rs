use log::debug;

use crate::dsp::{ScopeError, ScopeResult, TimeBase};
use crate::expr::lexer::Expression;
use crate::expr::parser::Operands;
use crate::types::{ChannelKind, Sample};

/// Dense acquisitions above this many points per unit of time division fall
/// through to the next required channel's length.
pub const POINTS_PER_TIME_DIV: f64 = 200_000.0;
/// Absolute ceiling on the A-driven evaluation length.
pub const MAX_EVALUATION_POINTS: usize = 10_000_000;

/// Value of a curve at `time`.
///
/// Uses `points[index]` when its time matches exactly, otherwise interpolates
/// linearly between the recorded points around `time`. Outside the recorded
/// range the curve contributes `0.0`.
pub fn approx_voltage(points: &[Sample], index: usize, time: f64) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if time < first.time || time > last.time {
        return 0.0;
    }
    if let Some(hint) = points.get(index) {
        if hint.time == time {
            return hint.voltage;
        }
    }

    let upper = points.partition_point(|s| s.time < time);
    let right = points[upper];
    if right.time == time || upper == 0 {
        return right.voltage;
    }
    let left = points[upper - 1];
    left.voltage + (right.voltage - left.voltage) * (time - left.time) / (right.time - left.time)
}

/// Number of points the math curve is evaluated over.
fn evaluation_length(
    expr: &Expression,
    a: &[Sample],
    b: &[Sample],
    f: &[Sample],
    sample_count: u32,
    time_div: f64,
) -> usize {
    let a_len = a.len();
    if expr.requires_a()
        && (a_len as f64) < time_div * POINTS_PER_TIME_DIV
        && a_len < MAX_EVALUATION_POINTS
    {
        a_len
    } else if expr.requires_b() {
        b.len()
    } else if expr.requires_f() {
        f.len()
    } else {
        sample_count as usize
    }
}

/// Evaluates `expr` across the display, sampling A, B and F on the math
/// channel's own time grid.
pub fn solve_over_domain(
    expr: &Expression,
    a: &[Sample],
    b: &[Sample],
    f: &[Sample],
    sample_count: u32,
    time_div: f64,
) -> ScopeResult<Vec<Sample>> {
    let required = [
        (expr.requires_a(), a, ChannelKind::RawA),
        (expr.requires_b(), b, ChannelKind::RawB),
        (expr.requires_f(), f, ChannelKind::Filter),
    ];
    for (needed, points, channel) in required {
        if needed && points.is_empty() {
            return Err(ScopeError::MissingChannelData(channel));
        }
    }

    let length = evaluation_length(expr, a, b, f, sample_count, time_div);
    let base = TimeBase::new(time_div, sample_count, length)?;
    let limit = base.end() + base.step() * 0.5;
    debug!("solving math channel over {length} of {sample_count} points");

    let mut result = Vec::with_capacity(length.min(sample_count as usize));
    let mut operands = Operands::default();
    for i in 0..sample_count as usize {
        let time = base.time_at(i);
        if time > limit {
            break;
        }
        if expr.requires_a() {
            operands.a = value_at(a, i, time);
        }
        if expr.requires_b() {
            operands.b = value_at(b, i, time);
        }
        if expr.requires_f() {
            operands.f = value_at(f, i, time);
        }
        result.push(Sample::new(time, expr.evaluate(&operands)?));
    }
    Ok(result)
}

fn value_at(points: &[Sample], index: usize, time: f64) -> f64 {
    match points.get(index) {
        Some(s) if s.time == time => s.voltage,
        _ => approx_voltage(points, index, time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitMode;
    use crate::dsp::convert;
    use crate::expr::validate;

    fn line(times: &[f64], slope: f64) -> Vec<Sample> {
        times.iter().map(|&t| Sample::new(t, slope * t)).collect()
    }

    #[test]
    fn approx_interpolates_between_points() {
        let points = line(&[0.0, 1.0, 3.0], 2.0);
        assert_eq!(approx_voltage(&points, 99, 2.0), 4.0);
        assert_eq!(approx_voltage(&points, 1, 1.0), 2.0);
        assert_eq!(approx_voltage(&points, 0, 3.0), 6.0);
    }

    #[test]
    fn approx_outside_range_is_zero() {
        let points = line(&[0.0, 1.0, 3.0], 2.0);
        assert_eq!(approx_voltage(&points, 0, -0.5), 0.0);
        assert_eq!(approx_voltage(&points, 0, 3.5), 0.0);
        assert_eq!(approx_voltage(&[], 0, 0.0), 0.0);
    }

    #[test]
    fn math_grid_matches_converted_channels() {
        let codes: Vec<u16> = (0..11).map(|i| i * 10).collect();
        let a = convert(&codes, BitMode::Eight, 1.0, 1.0, 11).unwrap();
        let b = convert(&codes, BitMode::Eight, 2.0, 1.0, 11).unwrap();
        let expr = validate("A+B*2").unwrap();
        let m = solve_over_domain(&expr, &a, &b, &[], 11, 1.0).unwrap();
        assert_eq!(m.len(), 11);
        for ((ms, sa), sb) in m.iter().zip(&a).zip(&b) {
            assert_eq!(ms.time, sa.time);
            assert!((ms.voltage - (sa.voltage + 2.0 * sb.voltage)).abs() < 1e-12);
        }
    }

    #[test]
    fn shorter_channel_contributes_zero_before_its_start() {
        let full = convert(&[128; 11], BitMode::Eight, 1.0, 1.0, 11).unwrap();
        let short = convert(&[256; 3], BitMode::Eight, 1.0, 1.0, 11).unwrap();
        // B is short, but A's length drives the grid.
        let expr = validate("A+B").unwrap();
        let m = solve_over_domain(&expr, &full, &short, &[], 11, 1.0).unwrap();
        assert_eq!(m.len(), 11);
        assert_eq!(m[0].voltage, 0.0);
        assert_eq!(m[10].voltage, 5.0);
    }

    #[test]
    fn constant_expression_uses_sample_count() {
        let expr = validate("2*pi").unwrap();
        let m = solve_over_domain(&expr, &[], &[], &[], 5, 1.0).unwrap();
        assert_eq!(m.len(), 5);
        assert!(m.iter().all(|s| s.voltage == 2.0 * 3.14159));
        assert_eq!(m[0].time, -5.0);
    }

    #[test]
    fn empty_required_channel_fails() {
        let expr = validate("A+F").unwrap();
        let a = line(&[0.0, 1.0], 1.0);
        assert!(matches!(
            solve_over_domain(&expr, &a, &[], &[], 11, 1.0),
            Err(ScopeError::MissingChannelData(ChannelKind::Filter))
        ));
    }

    #[test]
    fn evaluation_error_aborts_the_curve() {
        let expr = validate("A/0").unwrap();
        let a = line(&[-5.0, 5.0], 1.0);
        assert!(matches!(
            solve_over_domain(&expr, &a, &[], &[], 11, 1.0),
            Err(ScopeError::MalformedExpression(_))
        ));
    }

    #[test]
    fn dense_a_defers_to_b_length() {
        let expr = validate("A+B").unwrap();
        // time_div 0.00001 caps A at 2 points.
        let a = line(&[-0.00005, 0.0, 0.00005], 1.0);
        let b = line(&[0.0, 0.00005], 1.0);
        let len = evaluation_length(&expr, &a, &b, &[], 3, 0.00001);
        assert_eq!(len, 2);
    }
}
