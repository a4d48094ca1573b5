//! Health counters for the decoder stage

use std::sync::atomic::{AtomicU64, Ordering};

/// Health metrics for a decoder stage
///
/// Tracks what happened to every unit and every drain. All fields use atomic
/// operations, so the submission path and the pacing task can both record
/// without taking the codec lock.
#[derive(Debug, Default)]
pub struct StageHealth {
    /// Units of the configured kind handed to `submit`
    pub units_received: AtomicU64,

    /// Units of another kind, passed over without effect
    pub units_ignored: AtomicU64,

    /// Units dropped while waiting for the first keyframe
    pub units_discarded: AtomicU64,

    /// Units accepted by the codec
    pub units_decoded: AtomicU64,

    /// Units the codec rejected
    pub decode_failures: AtomicU64,

    /// Failed codec initializations (0 or 1)
    pub init_failures: AtomicU64,

    /// Calls that asked the codec for a frame
    pub drain_attempts: AtomicU64,

    /// Drains that found no frame ready
    pub empty_drains: AtomicU64,

    /// Frames accepted by the sink
    pub frames_forwarded: AtomicU64,

    /// Raster bytes accepted by the sink
    pub bytes_forwarded: AtomicU64,

    /// Frames the sink refused
    pub sink_rejections: AtomicU64,
}

impl StageHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.units_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.units_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.units_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.units_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_init_failure(&self) {
        self.init_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain(&self, found_frame: bool) {
        self.drain_attempts.fetch_add(1, Ordering::Relaxed);
        if !found_frame {
            self.empty_drains.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_forwarded(&self, size: usize) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_sink_rejection(&self) {
        self.sink_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn units_received(&self) -> u64 {
        self.units_received.load(Ordering::Relaxed)
    }

    pub fn units_ignored(&self) -> u64 {
        self.units_ignored.load(Ordering::Relaxed)
    }

    pub fn units_discarded(&self) -> u64 {
        self.units_discarded.load(Ordering::Relaxed)
    }

    pub fn units_decoded(&self) -> u64 {
        self.units_decoded.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    pub fn init_failures(&self) -> u64 {
        self.init_failures.load(Ordering::Relaxed)
    }

    pub fn drain_attempts(&self) -> u64 {
        self.drain_attempts.load(Ordering::Relaxed)
    }

    pub fn empty_drains(&self) -> u64 {
        self.empty_drains.load(Ordering::Relaxed)
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded.load(Ordering::Relaxed)
    }

    pub fn sink_rejections(&self) -> u64 {
        self.sink_rejections.load(Ordering::Relaxed)
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            units_received: self.units_received(),
            units_ignored: self.units_ignored(),
            units_discarded: self.units_discarded(),
            units_decoded: self.units_decoded(),
            decode_failures: self.decode_failures(),
            drain_attempts: self.drain_attempts(),
            empty_drains: self.empty_drains(),
            frames_forwarded: self.frames_forwarded(),
            bytes_forwarded: self.bytes_forwarded(),
            sink_rejections: self.sink_rejections(),
        }
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub units_received: u64,
    pub units_ignored: u64,
    pub units_discarded: u64,
    pub units_decoded: u64,
    pub decode_failures: u64,
    pub drain_attempts: u64,
    pub empty_drains: u64,
    pub frames_forwarded: u64,
    pub bytes_forwarded: u64,
    pub sink_rejections: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} units ({} ignored, {} before keyframe, {} decoded, {} failed), {} drains ({} empty), {} frames forwarded ({} bytes, {} rejected)",
            self.units_received,
            self.units_ignored,
            self.units_discarded,
            self.units_decoded,
            self.decode_failures,
            self.drain_attempts,
            self.empty_drains,
            self.frames_forwarded,
            self.bytes_forwarded,
            self.sink_rejections
        )
    }
}
