//! Oscilloscope channel pipeline.
//!
//! Each of the four channels (A, B, filter and math) runs on its own worker
//! thread. A pass turns the channel's input into a sequence of
//! `(time, voltage)` samples, then measures it and estimates its dominant
//! frequency. [`Scope`] owns the live settings and chains dependent channels.
pub mod config;
pub mod dsp;
pub mod expr;
pub mod pipeline;
pub mod render;
pub mod scope;
pub mod source;
pub mod types;
pub mod worker;

pub use config::{BitMode, ConfigurationSnapshot, FilteringMode};
pub use dsp::{FilterKind, FilterSpec, MeasurementResult, ScopeError, ScopeResult};
pub use expr::Expression;
pub use pipeline::{ChannelPipeline, PipelineOutput};
pub use render::{render_curves_png, PlotStyle, PlotView};
pub use scope::Scope;
pub use source::{AcquisitionFrame, AcquisitionSource, CaptureFile, ManualSource};
pub use types::{ChannelKind, ChannelMap, Published, Sample, ScopeEvent, ScopeSink};
pub use worker::ChannelWorker;
