//! Keyframe-gated decode pipeline
//!
//! The pipeline is a single stage sitting between an upstream producer of
//! encoded units and a downstream frame sink:
//! - Gate: nothing reaches the codec before the first keyframe
//! - Decode: one codec context, accessed under mutual exclusion
//! - Delivery: one drain per unit, or one drain per pacing tick
//! - Health: counters for every unit and frame that passes through
//!
//! ```text
//! Producer → submit → [gate] → codec ─ drain → FrameSink
//!                                       ↑
//!                               PacingScheduler (target_fps > 0)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod decode_stage;
pub mod gate;
pub mod health;
pub mod pacing;
pub mod stage;
pub mod state;
pub mod types;

#[cfg(test)]
mod testing;

pub use decode_stage::DecoderStage;
pub use gate::{KeyframeGate, is_keyframe};
pub use health::{HealthSummary, StageHealth};
pub use pacing::{PacedSource, PacingScheduler};
pub use stage::{ChannelSink, FrameSink, LogObserver, StageObserver};
pub use state::StageState;
pub use types::{EncodedUnit, OutputKind, Sample, SampleType};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
