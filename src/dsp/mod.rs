// src/dsp/mod.rs
pub mod convert;
pub mod enhance;
pub mod error;
pub mod filter;
pub mod spectrum;
pub mod stats;
pub mod taps;

pub use convert::{convert, TimeBase};
pub use enhance::bandpass_enhance;
pub use error::{Bracket, ScopeError, ScopeResult, SyntaxError};
pub use filter::{apply as apply_filter, FilterKind, FilterSpec};
pub use spectrum::{find_dominant_frequency, frequency_step};
pub use stats::{measure, MeasurementResult};
pub use taps::{load_filter_file, parse_filter_taps};
