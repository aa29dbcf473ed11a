use std::sync::Arc;

use log::debug;

use crate::config::{ConfigurationSnapshot, FilteringMode};
use crate::dsp::{self, MeasurementResult, ScopeError, ScopeResult};
use crate::expr;
use crate::types::{ChannelKind, Sample, ScopeEvent};

/// Everything one pass produced for a channel.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub channel: ChannelKind,
    pub samples: Arc<Vec<Sample>>,
    pub measurement: Option<MeasurementResult>,
    pub frequency_hz: f64,
}

impl PipelineOutput {
    /// Events in publication order: curve, measurement, frequency.
    pub fn into_events(self) -> Vec<ScopeEvent> {
        let mut events = Vec::with_capacity(3);
        events.push(ScopeEvent::PlotReady(self.channel, self.samples));
        if let Some(m) = self.measurement {
            events.push(ScopeEvent::Measured(self.channel, m));
        }
        events.push(ScopeEvent::Frequency(self.channel, self.frequency_hz));
        events
    }
}

/// Processing state owned by one channel.
pub struct ChannelPipeline {
    channel: ChannelKind,
    curve: Arc<Vec<Sample>>,
    last_snapshot: Option<Arc<ConfigurationSnapshot>>,
}

impl ChannelPipeline {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            curve: Arc::default(),
            last_snapshot: None,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Curve from the last successful pass.
    pub fn curve(&self) -> &Arc<Vec<Sample>> {
        &self.curve
    }

    pub fn last_snapshot(&self) -> Option<&ConfigurationSnapshot> {
        self.last_snapshot.as_deref()
    }

    /// Runs one full pass. On failure the previous curve is kept.
    pub fn process(&mut self, snapshot: Arc<ConfigurationSnapshot>) -> ScopeResult<PipelineOutput> {
        let samples = match self.channel {
            ChannelKind::RawA | ChannelKind::RawB => self.acquire(&snapshot)?,
            ChannelKind::Filter => self.filter(&snapshot)?,
            ChannelKind::Math => self.evaluate(&snapshot)?,
        };
        let output = self.analyze(&snapshot, samples)?;
        self.curve = Arc::clone(&output.samples);
        self.last_snapshot = Some(snapshot);
        Ok(output)
    }

    /// Formats a failed pass the way it is shown to the user.
    pub fn describe_error(&self, err: &ScopeError) -> String {
        match self.channel {
            ChannelKind::Math => format!("Expression could not be evaluated: {err}"),
            channel => format!("Processing {channel} failed: {err}"),
        }
    }

    fn acquire(&self, snapshot: &ConfigurationSnapshot) -> ScopeResult<Vec<Sample>> {
        let time_div = snapshot.time_div_value()?;
        let samples = dsp::convert(
            snapshot.acquisition(self.channel),
            snapshot.bit_mode,
            snapshot.voltage_div_volts(self.channel)?,
            time_div,
            snapshot.sample_count,
        )?;

        if self.channel == ChannelKind::RawA && snapshot.filter.mode == FilteringMode::Bandpass {
            if let Some(enhanced) = dsp::bandpass_enhance(&samples, time_div) {
                return Ok(enhanced);
            }
        }
        Ok(samples)
    }

    fn filter(&self, snapshot: &ConfigurationSnapshot) -> ScopeResult<Vec<Sample>> {
        let spec = snapshot
            .filter
            .spec
            .as_ref()
            .ok_or_else(|| ScopeError::InvalidFilterSpec("no filter loaded".into()))?;
        let source = snapshot.plot(snapshot.filter.source);
        debug!(
            "filtering {} (version {}, {} points)",
            snapshot.filter.source,
            source.version,
            source.samples.len()
        );
        dsp::apply_filter(&source.samples, spec)
    }

    fn evaluate(&self, snapshot: &ConfigurationSnapshot) -> ScopeResult<Vec<Sample>> {
        let expression = expr::validate(&snapshot.equation)?;
        expr::solve_over_domain(
            &expression,
            &snapshot.plot(ChannelKind::RawA).samples,
            &snapshot.plot(ChannelKind::RawB).samples,
            &snapshot.plot(ChannelKind::Filter).samples,
            snapshot.sample_count,
            snapshot.time_div_value()?,
        )
    }

    fn analyze(
        &self,
        snapshot: &ConfigurationSnapshot,
        samples: Vec<Sample>,
    ) -> ScopeResult<PipelineOutput> {
        let measurement = dsp::measure(&samples, snapshot.voltage_div_volts(self.channel)?);
        let frequency_hz = dsp::find_dominant_frequency(&samples, snapshot.time_div_value()?);
        Ok(PipelineOutput {
            channel: self.channel,
            samples: Arc::new(samples),
            measurement,
            frequency_hz,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitMode;
    use crate::dsp::FilterSpec;
    use crate::types::Published;

    fn snapshot_with_a(codes: Vec<u16>) -> ConfigurationSnapshot {
        let mut snapshot = ConfigurationSnapshot {
            sample_count: codes.len() as u32,
            bit_mode: BitMode::Eight,
            time_div: 9,
            ..Default::default()
        };
        snapshot.acquisition.a = Arc::new(codes);
        snapshot
    }

    #[test]
    fn raw_channel_converts_and_measures() {
        let mut pipeline = ChannelPipeline::new(ChannelKind::RawA);
        let output = pipeline
            .process(Arc::new(snapshot_with_a(vec![128; 16])))
            .unwrap();
        assert_eq!(output.samples.len(), 16);
        let m = output.measurement.unwrap();
        assert_eq!(m.max, 0.0);
        assert_eq!(m.std_dev, 0.0);
        assert_eq!(output.frequency_hz, 0.0);
        assert_eq!(pipeline.curve().len(), 16);

        let events = output.into_events();
        assert!(matches!(events[0], ScopeEvent::PlotReady(ChannelKind::RawA, _)));
        assert!(matches!(events[1], ScopeEvent::Measured(ChannelKind::RawA, _)));
        assert!(matches!(events[2], ScopeEvent::Frequency(ChannelKind::RawA, _)));
    }

    #[test]
    fn filter_channel_reads_published_source() {
        let mut snapshot = snapshot_with_a(vec![]);
        let source: Vec<Sample> = (0..8).map(|i| Sample::new(i as f64, 1.0)).collect();
        snapshot.plot_points.b = Published {
            version: 3,
            samples: Arc::new(source.clone()),
        };
        snapshot.filter.enabled = true;
        snapshot.filter.source = ChannelKind::RawB;
        snapshot.filter.spec = Some(FilterSpec::fir(vec![1.0], ChannelKind::RawB));

        let mut pipeline = ChannelPipeline::new(ChannelKind::Filter);
        let output = pipeline.process(Arc::new(snapshot)).unwrap();
        assert_eq!(*output.samples, source);
    }

    #[test]
    fn filter_without_spec_fails() {
        let mut pipeline = ChannelPipeline::new(ChannelKind::Filter);
        let err = pipeline
            .process(Arc::new(ConfigurationSnapshot::default()))
            .unwrap_err();
        assert!(matches!(err, ScopeError::InvalidFilterSpec(_)));
    }

    #[test]
    fn failed_math_keeps_previous_curve() {
        let mut snapshot = snapshot_with_a(vec![]);
        snapshot.sample_count = 5;
        snapshot.equation = "1+1".into();
        let mut pipeline = ChannelPipeline::new(ChannelKind::Math);
        let first = pipeline.process(Arc::new(snapshot.clone())).unwrap();
        assert_eq!(first.samples.len(), 5);

        snapshot.equation = "A+(".into();
        let err = pipeline.process(Arc::new(snapshot)).unwrap_err();
        assert!(pipeline
            .describe_error(&err)
            .starts_with("Expression could not be evaluated: "));
        assert_eq!(pipeline.curve().len(), 5);
        assert!(pipeline.curve().iter().all(|s| s.voltage == 2.0));
    }

    #[test]
    fn bandpass_mode_enhances_channel_a_only() {
        let mut snapshot = snapshot_with_a(vec![128; 1000]);
        snapshot.time_div = 12; // 0.1
        snapshot.filter.mode = FilteringMode::Bandpass;
        snapshot.acquisition.b = Arc::new(vec![128; 1000]);

        let mut a = ChannelPipeline::new(ChannelKind::RawA);
        let mut b = ChannelPipeline::new(ChannelKind::RawB);
        let snapshot = Arc::new(snapshot);
        assert!(a.process(Arc::clone(&snapshot)).unwrap().samples.len() > 1000);
        assert_eq!(b.process(snapshot).unwrap().samples.len(), 1000);
    }
}
