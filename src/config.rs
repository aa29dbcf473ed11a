// src/config.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dsp::{FilterSpec, ScopeError};
use crate::types::{ChannelKind, ChannelMap, Published};

/// Volts per vertical division, selected by index.
pub const VERTICAL_DIVISIONS: [f64; 7] = [2.0, 1.0, 0.5, 0.2, 0.1, 0.05, 0.02];

/// Horizontal division values, selected by index.
pub const HORIZONTAL_DIVISIONS: [f64; 19] = [
    1000.0, 500.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.0, 1.0, 0.5, 0.2, 0.1, 0.05, 0.02,
    0.01, 0.005, 0.002, 0.001,
];

pub const DEFAULT_SAMPLE_COUNT: u32 = 25_000;

/// ADC resolution of the acquisition codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitMode {
    Eight,
    #[default]
    Twelve,
}

impl BitMode {
    pub fn bits(self) -> u32 {
        match self {
            BitMode::Eight => 8,
            BitMode::Twelve => 12,
        }
    }

    /// Number of distinct codes, as a float for the voltage step.
    pub fn resolution(self) -> f64 {
        2f64.powi(self.bits() as i32)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    #[default]
    Dc,
    Ac,
}

/// Secondary processing applied to channel A.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilteringMode {
    #[default]
    Lowpass,
    Bandpass,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    Armed,
    Triggered,
    #[default]
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    #[default]
    Auto,
    Normal,
    Single,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    #[default]
    Rising,
    Falling,
    Level,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub state: TriggerState,
    pub mode: TriggerMode,
    pub kind: TriggerType,
    pub channel: ChannelKind,
    pub threshold: u16,
    pub forced: bool,
    pub index: usize,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            state: TriggerState::Stopped,
            mode: TriggerMode::Auto,
            kind: TriggerType::Rising,
            channel: ChannelKind::RawA,
            threshold: 2047,
            forced: false,
            index: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub enabled: bool,
    /// Channel whose published curve feeds the filter channel.
    pub source: ChannelKind,
    pub spec: Option<FilterSpec>,
    pub mode: FilteringMode,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source: ChannelKind::RawA,
            spec: None,
            mode: FilteringMode::Lowpass,
        }
    }
}

/// Everything one processing pass needs, copied out of the live scope state.
///
/// Large buffers sit behind `Arc`, so cloning a snapshot is cheap and a worker
/// can never observe the writer's later changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationSnapshot {
    pub sample_count: u32,
    pub bit_mode: BitMode,
    /// Index into [`VERTICAL_DIVISIONS`] per channel.
    pub voltage_div: ChannelMap<usize>,
    /// Index into [`HORIZONTAL_DIVISIONS`].
    pub time_div: usize,
    pub offsets: ChannelMap<u16>,
    pub coupling: ChannelMap<Coupling>,
    pub trigger: TriggerSettings,
    pub filter: FilterSettings,
    pub equation: String,
    pub plot_points: ChannelMap<Published>,
    pub acquisition: ChannelMap<Arc<Vec<u16>>>,
}

impl Default for ConfigurationSnapshot {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            bit_mode: BitMode::Twelve,
            voltage_div: ChannelMap::default(),
            time_div: 0,
            offsets: ChannelMap::splat(512),
            coupling: ChannelMap::default(),
            trigger: TriggerSettings::default(),
            filter: FilterSettings::default(),
            equation: String::new(),
            plot_points: ChannelMap::default(),
            acquisition: ChannelMap::default(),
        }
    }
}

impl ConfigurationSnapshot {
    pub fn from_json_str(text: &str) -> Result<Self, ScopeError> {
        serde_json::from_str(text).map_err(|e| ScopeError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScopeError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Volts per division for `channel`.
    pub fn voltage_div_volts(&self, channel: ChannelKind) -> Result<f64, ScopeError> {
        let index = *self.voltage_div.get(channel);
        VERTICAL_DIVISIONS
            .get(index)
            .copied()
            .ok_or(ScopeError::InvalidDivision {
                table: "vertical",
                index,
            })
    }

    pub fn time_div_value(&self) -> Result<f64, ScopeError> {
        HORIZONTAL_DIVISIONS
            .get(self.time_div)
            .copied()
            .ok_or(ScopeError::InvalidDivision {
                table: "horizontal",
                index: self.time_div,
            })
    }

    pub fn acquisition(&self, channel: ChannelKind) -> &[u16] {
        self.acquisition.get(channel)
    }

    pub fn plot(&self, channel: ChannelKind) -> &Published {
        self.plot_points.get(channel)
    }

    /// True when the equation text mentions `channel`'s letter.
    pub fn equation_uses(&self, channel: ChannelKind) -> bool {
        self.equation.contains(channel.letter())
    }
}
