//! Core types for the decoder pipeline

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::decoder::DecodedFrame;

/// Kind of an encoded payload travelling through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    /// VP8 video frame
    Vp8,
    /// VP9 video frame
    Vp9,
    /// H.264 Annex B access unit
    H264,
    /// Opus audio packet
    Opus,
}

impl SampleType {
    /// Whether a decoder stage can be built for this kind
    pub fn is_video(&self) -> bool {
        !matches!(self, SampleType::Opus)
    }

    /// Codec name as understood by FFmpeg
    pub fn codec_name(&self) -> &'static str {
        match self {
            SampleType::Vp8 => "vp8",
            SampleType::Vp9 => "vp9",
            SampleType::H264 => "h264",
            SampleType::Opus => "opus",
        }
    }
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::Vp8 => write!(f, "VP8"),
            SampleType::Vp9 => write!(f, "VP9"),
            SampleType::H264 => write!(f, "H264"),
            SampleType::Opus => write!(f, "Opus"),
        }
    }
}

/// Raster representation of frames handed downstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Planar luma/chroma, 4:2:0
    #[default]
    YCbCr,
    /// Packed 8-bit RGBA
    Rgba,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::YCbCr => write!(f, "YCbCr"),
            OutputKind::Rgba => write!(f, "RGBA"),
        }
    }
}

impl std::str::FromStr for OutputKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ycbcr" | "yuv" | "i420" => Ok(OutputKind::YCbCr),
            "rgba" => Ok(OutputKind::Rgba),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown output kind '{other}'"
            ))),
        }
    }
}

/// One compressed access unit, tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUnit {
    pub kind: SampleType,
    pub payload: Bytes,
}

impl EncodedUnit {
    pub fn new(kind: SampleType, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Get the size of the payload in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Decoded frame envelope delivered to the frame sink
///
/// `kind` always matches the representation held in `frame`.
#[derive(Debug, Clone)]
pub struct Sample {
    pub kind: OutputKind,
    /// Position of this frame in the stage's output, starting at 0
    pub sequence: u64,
    pub frame: DecodedFrame,
}

impl Sample {
    pub fn new(sequence: u64, frame: DecodedFrame) -> Self {
        Self {
            kind: frame.kind(),
            sequence,
            frame,
        }
    }

    /// Get the size of the raster data in bytes
    pub fn size(&self) -> usize {
        self.frame.size()
    }
}
