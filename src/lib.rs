//! Keyframe-gated video decoding with optional output pacing.
//!
//! A [`DecoderStage`] receives encoded units from an upstream producer,
//! ignores everything until the first keyframe of its codec, decodes through a
//! mutually exclusive [`decoder::CodecContext`] and forwards decoded frames to
//! a [`pipeline::FrameSink`], either immediately or at a fixed rate.

pub mod config;
pub mod decoder;
pub mod error;
pub mod ivf;
pub mod pipeline;

pub use config::DecoderConfig;
pub use error::{Error, Result};
pub use pipeline::DecoderStage;
