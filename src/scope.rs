// src/scope.rs
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::{
    BitMode, ConfigurationSnapshot, FilteringMode, HORIZONTAL_DIVISIONS, VERTICAL_DIVISIONS,
};
use crate::dsp::{FilterSpec, ScopeError, ScopeResult};
use crate::types::{ChannelKind, ChannelMap, Published, Sample, ScopeEvent};
use crate::worker::ChannelWorker;

/// Owns the live configuration and the four channel workers.
///
/// Every request hands the worker a fresh snapshot of the live state. Curves
/// coming back are stored as the channel's published sequence, which in turn
/// re-triggers the math and filter channels that depend on it. Refused
/// requests return an error and are also reported as [`ScopeEvent::Error`].
pub struct Scope {
    config: ConfigurationSnapshot,
    workers: ChannelMap<ChannelWorker>,
    events: Receiver<ScopeEvent>,
    notices: Sender<ScopeEvent>,
}

impl Scope {
    pub fn new(config: ConfigurationSnapshot) -> ScopeResult<Self> {
        let (tx, events) = mpsc::channel();
        let workers = ChannelMap {
            a: ChannelWorker::spawn(ChannelKind::RawA, tx.clone())?,
            b: ChannelWorker::spawn(ChannelKind::RawB, tx.clone())?,
            filter: ChannelWorker::spawn(ChannelKind::Filter, tx.clone())?,
            math: ChannelWorker::spawn(ChannelKind::Math, tx.clone())?,
        };
        info!(
            "scope ready: {} samples, {:?} resolution",
            config.sample_count, config.bit_mode
        );
        Ok(Self {
            config,
            workers,
            events,
            notices: tx,
        })
    }

    pub fn config(&self) -> &ConfigurationSnapshot {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        Arc::new(self.config.clone())
    }

    /// Last curve published for `channel`.
    pub fn curve(&self, channel: ChannelKind) -> Arc<Vec<Sample>> {
        Arc::clone(&self.config.plot(channel).samples)
    }

    /// Requests one pass on `channel` with the current configuration.
    pub fn process(&self, channel: ChannelKind) {
        if !self.workers.get(channel).process(self.snapshot()) {
            warn!("{channel} worker is no longer running");
        }
    }

    /// Stores a fresh acquisition for a raw channel and processes it.
    pub fn ingest_acquisition(&mut self, channel: ChannelKind, codes: Vec<u16>) -> ScopeResult<()> {
        if !channel.is_raw() {
            return Err(self.refuse(ScopeError::Rejected(format!(
                "{channel} does not take raw acquisitions"
            ))));
        }
        debug!("{channel}: {} codes acquired", codes.len());
        *self.config.acquisition.get_mut(channel) = Arc::new(codes);
        self.process(channel);
        Ok(())
    }

    pub fn set_equation(&mut self, equation: &str) -> ScopeResult<()> {
        if self.config.filter.source == ChannelKind::Math && equation.contains('F') {
            return Err(self.refuse(ScopeError::Rejected(
                "Math channel can not be dependent on the filter channel whilst the math channel is being filtered."
                    .into(),
            )));
        }
        self.config.equation = equation.to_owned();
        self.process(ChannelKind::Math);
        Ok(())
    }

    /// Installs a filter and runs the filter channel over its source.
    pub fn load_filter(&mut self, spec: FilterSpec) -> ScopeResult<()> {
        spec.validate()
            .and_then(|()| self.check_filter_source(spec.source))
            .map_err(|err| self.refuse(err))?;
        info!(
            "{:?} filter with {} taps applied to {}",
            spec.kind,
            spec.feedforward.len(),
            spec.source
        );
        self.config.filter.source = spec.source;
        self.config.filter.spec = Some(spec);
        self.config.filter.enabled = true;
        self.process(ChannelKind::Filter);
        Ok(())
    }

    pub fn set_filter_source(&mut self, source: ChannelKind) -> ScopeResult<()> {
        self.check_filter_source(source).map_err(|err| self.refuse(err))?;
        self.config.filter.source = source;
        if let Some(spec) = self.config.filter.spec.as_mut() {
            spec.source = source;
        }
        if self.config.filter.enabled {
            self.process(ChannelKind::Filter);
        }
        Ok(())
    }

    pub fn disable_filter(&mut self) {
        self.config.filter.enabled = false;
    }

    /// Reports a refused request on the event stream and hands it back.
    fn refuse(&self, err: ScopeError) -> ScopeError {
        warn!("request refused: {err}");
        self.notices.send(ScopeEvent::Error(err.to_string())).ok();
        err
    }

    fn check_filter_source(&self, source: ChannelKind) -> ScopeResult<()> {
        match source {
            ChannelKind::Filter => Err(ScopeError::Rejected(
                "the filter channel cannot filter itself.".into(),
            )),
            ChannelKind::Math if self.config.equation_uses(ChannelKind::Filter) => {
                Err(ScopeError::Rejected(
                    "The math channel cannot be filtered while dependent on the filter channel."
                        .into(),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn set_filtering_mode(&mut self, mode: FilteringMode) {
        self.config.filter.mode = mode;
    }

    pub fn set_voltage_div(&mut self, channel: ChannelKind, index: usize) -> ScopeResult<()> {
        if index >= VERTICAL_DIVISIONS.len() {
            return Err(self.refuse(ScopeError::InvalidDivision {
                table: "vertical",
                index,
            }));
        }
        *self.config.voltage_div.get_mut(channel) = index;
        Ok(())
    }

    pub fn set_time_div(&mut self, index: usize) -> ScopeResult<()> {
        if index >= HORIZONTAL_DIVISIONS.len() {
            return Err(self.refuse(ScopeError::InvalidDivision {
                table: "horizontal",
                index,
            }));
        }
        self.config.time_div = index;
        Ok(())
    }

    pub fn set_bit_mode(&mut self, bit_mode: BitMode) {
        self.config.bit_mode = bit_mode;
    }

    pub fn set_sample_count(&mut self, sample_count: u32) -> ScopeResult<()> {
        if sample_count <= 1 {
            return Err(self.refuse(ScopeError::InsufficientSamples));
        }
        self.config.sample_count = sample_count;
        Ok(())
    }

    /// Applies a worker event to the live state and triggers dependants.
    pub fn handle_event(&mut self, event: ScopeEvent) -> ScopeEvent {
        match &event {
            ScopeEvent::PlotReady(channel, samples) => {
                self.publish(*channel, Arc::clone(samples));
            }
            ScopeEvent::Error(message) => warn!("{message}"),
            ScopeEvent::Measured(..) | ScopeEvent::Frequency(..) => {}
        }
        event
    }

    fn publish(&mut self, channel: ChannelKind, samples: Arc<Vec<Sample>>) {
        let slot = self.config.plot_points.get_mut(channel);
        *slot = Published {
            version: slot.version + 1,
            samples,
        };
        debug!("{channel}: published version {}", slot.version);
        if channel.is_raw() {
            *self.config.acquisition.get_mut(channel) = Arc::default();
        }

        if channel != ChannelKind::Math && self.config.equation_uses(channel) {
            self.process(ChannelKind::Math);
        }
        if self.config.filter.enabled
            && self.config.filter.source == channel
            && channel != ChannelKind::Filter
        {
            self.process(ChannelKind::Filter);
        }
    }

    /// Waits up to `timeout` for the next event and applies it.
    pub fn poll(&mut self, timeout: Duration) -> Option<ScopeEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.handle_event(event)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("all channel workers have stopped");
                None
            }
        }
    }

    /// Handles events until none arrives for `idle`.
    pub fn drain(&mut self, idle: Duration) -> Vec<ScopeEvent> {
        let mut seen = Vec::new();
        while let Some(event) = self.poll(idle) {
            seen.push(event);
        }
        seen
    }

    pub fn shutdown(&mut self) {
        for channel in ChannelKind::ALL {
            self.workers.get_mut(channel).shutdown();
        }
        info!("scope stopped");
    }
}
