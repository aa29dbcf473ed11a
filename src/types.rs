// src/types.rs
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConfigurationSnapshot;
use crate::dsp::MeasurementResult;

/// One of the four scope channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    RawA,
    RawB,
    Filter,
    Math,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::RawA,
        ChannelKind::RawB,
        ChannelKind::Filter,
        ChannelKind::Math,
    ];

    /// Letter used for the channel inside math expressions.
    pub fn letter(self) -> char {
        match self {
            ChannelKind::RawA => 'A',
            ChannelKind::RawB => 'B',
            ChannelKind::Filter => 'F',
            ChannelKind::Math => 'M',
        }
    }

    pub fn is_raw(self) -> bool {
        matches!(self, ChannelKind::RawA | ChannelKind::RawB)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::RawA => "channel A",
            ChannelKind::RawB => "channel B",
            ChannelKind::Filter => "filter channel",
            ChannelKind::Math => "math channel",
        };
        f.write_str(name)
    }
}

/// A single plotted point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds relative to the centre of the display.
    pub time: f64,
    pub voltage: f64,
}

impl Sample {
    pub fn new(time: f64, voltage: f64) -> Self {
        Self { time, voltage }
    }
}

/// Fixed-size per-channel storage, indexed by [`ChannelKind`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMap<T> {
    pub a: T,
    pub b: T,
    pub filter: T,
    pub math: T,
}

impl<T> ChannelMap<T> {
    pub fn splat(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            a: value.clone(),
            b: value.clone(),
            filter: value.clone(),
            math: value,
        }
    }

    pub fn get(&self, kind: ChannelKind) -> &T {
        match kind {
            ChannelKind::RawA => &self.a,
            ChannelKind::RawB => &self.b,
            ChannelKind::Filter => &self.filter,
            ChannelKind::Math => &self.math,
        }
    }

    pub fn get_mut(&mut self, kind: ChannelKind) -> &mut T {
        match kind {
            ChannelKind::RawA => &mut self.a,
            ChannelKind::RawB => &mut self.b,
            ChannelKind::Filter => &mut self.filter,
            ChannelKind::Math => &mut self.math,
        }
    }
}

/// Last sequence a channel published, shared read-only between workers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Published {
    pub version: u64,
    pub samples: Arc<Vec<Sample>>,
}

impl Published {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Requests posted to a channel worker's inbox.
#[derive(Clone, Debug)]
pub enum WorkerCommand {
    Process(Arc<ConfigurationSnapshot>),
    Shutdown,
}

/// Results flowing back from the workers.
#[derive(Clone, Debug)]
pub enum ScopeEvent {
    PlotReady(ChannelKind, Arc<Vec<Sample>>),
    Measured(ChannelKind, MeasurementResult),
    Frequency(ChannelKind, f64),
    Error(String),
}

/// Callback-style consumer of [`ScopeEvent`]s, for front ends that prefer it
/// over draining the event channel themselves.
pub trait ScopeSink {
    fn on_plot_ready(&mut self, channel: ChannelKind, samples: &[Sample]);
    fn on_measured(&mut self, channel: ChannelKind, result: MeasurementResult);
    fn on_frequency(&mut self, channel: ChannelKind, frequency_hz: f64);
    fn on_error(&mut self, message: &str);

    fn dispatch(&mut self, event: &ScopeEvent) {
        match event {
            ScopeEvent::PlotReady(channel, samples) => self.on_plot_ready(*channel, samples),
            ScopeEvent::Measured(channel, result) => self.on_measured(*channel, *result),
            ScopeEvent::Frequency(channel, hz) => self.on_frequency(*channel, *hz),
            ScopeEvent::Error(message) => self.on_error(message),
        }
    }
}
