// src/source.rs
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ConfigurationSnapshot;
use crate::dsp::{ScopeError, ScopeResult};
use crate::types::ChannelKind;

/// Raw ADC codes captured for one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionFrame {
    pub channel: ChannelKind,
    pub codes: Vec<u16>,
}

impl AcquisitionFrame {
    pub fn validate(&self) -> ScopeResult<()> {
        if !self.channel.is_raw() {
            return Err(ScopeError::Config(format!(
                "frame for {} holds raw codes",
                self.channel
            )));
        }
        Ok(())
    }
}

/// Anything that can yield acquisitions on demand.
pub trait AcquisitionSource {
    fn next_frame(&mut self) -> ScopeResult<Option<AcquisitionFrame>>;
}

/// In-memory source for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<AcquisitionFrame>,
}

impl ManualSource {
    pub fn new(frames: impl IntoIterator<Item = AcquisitionFrame>) -> Self {
        Self {
            queue: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl AcquisitionSource for ManualSource {
    fn next_frame(&mut self) -> ScopeResult<Option<AcquisitionFrame>> {
        let frame = self.queue.pop_front();
        if let Some(frame) = &frame {
            frame.validate()?;
        }
        Ok(frame)
    }
}

/// A recorded session: the scope settings plus the acquisitions to replay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureFile {
    pub config: ConfigurationSnapshot,
    pub frames: Vec<AcquisitionFrame>,
}

impl CaptureFile {
    pub fn from_json_str(text: &str) -> ScopeResult<Self> {
        let capture: Self =
            serde_json::from_str(text).map_err(|e| ScopeError::Config(e.to_string()))?;
        for frame in &capture.frames {
            frame.validate()?;
        }
        debug!("capture holds {} frames", capture.frames.len());
        Ok(capture)
    }

    pub fn load(path: impl AsRef<Path>) -> ScopeResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> ScopeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScopeError::Config(e.to_string()))
    }

    /// Splits the capture into its settings and a replay source.
    pub fn into_parts(self) -> (ConfigurationSnapshot, ManualSource) {
        (self.config, ManualSource::new(self.frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BitMode;

    fn frame(channel: ChannelKind, codes: &[u16]) -> AcquisitionFrame {
        AcquisitionFrame {
            channel,
            codes: codes.to_vec(),
        }
    }

    #[test]
    fn manual_source_replays_in_order() {
        let mut source = ManualSource::new([
            frame(ChannelKind::RawA, &[1, 2]),
            frame(ChannelKind::RawB, &[3]),
        ]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().codes, vec![1, 2]);
        assert_eq!(
            source.next_frame().unwrap().unwrap().channel,
            ChannelKind::RawB
        );
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn derived_channels_cannot_carry_codes() {
        let mut source = ManualSource::new([frame(ChannelKind::Math, &[1])]);
        assert!(matches!(source.next_frame(), Err(ScopeError::Config(_))));
    }

    #[test]
    fn capture_parses_settings_and_frames() {
        let capture = CaptureFile::from_json_str(
            r#"{
                "config": { "sample_count": 4, "bit_mode": "eight", "time_div": 9 },
                "frames": [ { "channel": "RawA", "codes": [0, 64, 128, 255] } ]
            }"#,
        )
        .unwrap();
        assert_eq!(capture.config.bit_mode, BitMode::Eight);
        let (config, mut source) = capture.into_parts();
        assert_eq!(config.sample_count, 4);
        assert_eq!(source.next_frame().unwrap().unwrap().codes.len(), 4);
    }

    #[test]
    fn capture_survives_a_file_round_trip() {
        let capture = CaptureFile {
            frames: vec![frame(ChannelKind::RawB, &[7, 8, 9])],
            ..Default::default()
        };
        let path = std::env::temp_dir()
            .join(format!("scope-capture-{}.json", std::process::id()));
        fs::write(&path, capture.to_json_string().unwrap()).unwrap();
        let loaded = CaptureFile::load(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(loaded.frames, capture.frames);
    }

    #[test]
    fn bad_capture_is_a_config_error() {
        assert!(matches!(
            CaptureFile::from_json_str("{ \"frames\": 3 }"),
            Err(ScopeError::Config(_))
        ));
    }
}
