// src/render.rs
use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::dsp::{ScopeError, ScopeResult};
use crate::types::{ChannelKind, Sample};

/// Visible window: the display spans ±5 divisions on both axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotView {
    pub time_div: f64,
    pub voltage_div: f64,
}

impl PlotView {
    fn time_range(&self) -> std::ops::Range<f64> {
        -5.0 * self.time_div..5.0 * self.time_div
    }

    fn voltage_range(&self) -> std::ops::Range<f64> {
        -5.0 * self.voltage_div..5.0 * self.voltage_div
    }
}

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub grid: RGBColor,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
            background: RGBColor(10, 10, 10),
            grid: RGBColor(60, 60, 60),
        }
    }
}

impl PlotStyle {
    pub fn color(channel: ChannelKind) -> RGBColor {
        match channel {
            ChannelKind::RawA => YELLOW,
            ChannelKind::RawB => CYAN,
            ChannelKind::Filter => MAGENTA,
            ChannelKind::Math => GREEN,
        }
    }
}

/// Draws the given curves over a 10 x 10 division grid and returns PNG bytes.
pub fn render_curves_png(
    curves: &[(ChannelKind, &[Sample])],
    view: PlotView,
    style: &PlotStyle,
) -> ScopeResult<Vec<u8>> {
    if !(view.time_div > 0.0 && view.voltage_div > 0.0) {
        return Err(ScopeError::Plot("divisions must be positive".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(view.time_range(), view.voltage_range())?;

        let (t0, t1) = (view.time_range().start, view.time_range().end);
        let (v0, v1) = (view.voltage_range().start, view.voltage_range().end);
        let grid = style.grid;
        chart.draw_series((-5..=5).map(|k| {
            let t = k as f64 * view.time_div;
            PathElement::new(vec![(t, v0), (t, v1)], grid)
        }))?;
        chart.draw_series((-5..=5).map(|k| {
            let v = k as f64 * view.voltage_div;
            PathElement::new(vec![(t0, v), (t1, v)], grid)
        }))?;

        for (channel, samples) in curves {
            if samples.is_empty() {
                continue;
            }
            let series = samples.iter().map(|s| (s.time, s.voltage));
            chart.draw_series(LineSeries::new(series, PlotStyle::color(*channel)))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> ScopeResult<Vec<u8>> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn renders_png_with_curves() {
        let samples: Vec<Sample> = (0..=100)
            .map(|i| {
                let t = -5.0 + i as f64 * 0.1;
                Sample::new(t, t.sin())
            })
            .collect();
        let style = PlotStyle {
            width: 200,
            height: 120,
            ..Default::default()
        };
        let png = render_curves_png(
            &[(ChannelKind::RawA, samples.as_slice()), (ChannelKind::Math, &[][..])],
            PlotView {
                time_div: 1.0,
                voltage_div: 0.5,
            },
            &style,
        )
        .unwrap();
        assert_eq!(png[..8], PNG_MAGIC);
    }

    #[test]
    fn zero_division_is_rejected() {
        let view = PlotView {
            time_div: 0.0,
            voltage_div: 1.0,
        };
        assert!(matches!(
            render_curves_png(&[], view, &PlotStyle::default()),
            Err(ScopeError::Plot(_))
        ));
    }
}
