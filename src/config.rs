//! Decoder stage configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pipeline::{OutputKind, SampleType};

/// Construction-time configuration of a decoder stage
///
/// `target_fps == 0` selects synchronous delivery (one drain per submitted
/// unit); any positive value selects paced delivery at that rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Kind of payload the stage decodes; other kinds pass through untouched
    pub codec: SampleType,
    /// Output cadence in frames per second, 0 for synchronous delivery
    pub target_fps: f32,
    /// Raster representation handed to the sink
    pub output: OutputKind,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            codec: SampleType::Vp8,
            target_fps: 0.0,
            output: OutputKind::YCbCr,
        }
    }
}

impl DecoderConfig {
    pub fn new(codec: SampleType) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Configure the pacing rate
    pub fn with_target_fps(mut self, fps: f32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Configure the output representation
    pub fn with_output(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "target_fps must be a finite value >= 0, got {}",
                self.target_fps
            )));
        }
        if !self.codec.is_video() {
            return Err(Error::InvalidConfig(format!(
                "{} is not a video codec",
                self.codec
            )));
        }
        Ok(())
    }

    /// Whether frames are delivered by the pacing task rather than by `submit`
    pub fn is_async(&self) -> bool {
        self.target_fps > 0.0
    }

    /// Interval between two paced drains, truncated to whole milliseconds
    ///
    /// Rates above 1000 fps are clamped to a 1 ms period.
    pub fn pacing_period(&self) -> Option<Duration> {
        if !self.is_async() {
            return None;
        }
        let millis = (1000.0 / f64::from(self.target_fps)) as u64;
        Some(Duration::from_millis(millis.max(1)))
    }
}
