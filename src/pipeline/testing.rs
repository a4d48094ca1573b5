//! Fakes shared by the pipeline tests

use anyhow::bail;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::stage::{FrameSink, StageObserver};
use super::types::{EncodedUnit, Sample, SampleType};
use crate::decoder::{CodecContext, YCbCrImage};
use crate::error::Error;

/// Second payload byte marking a unit the scripted codec rejects
pub const CORRUPT: u8 = 0xFF;

pub fn keyframe() -> EncodedUnit {
    EncodedUnit::new(SampleType::Vp8, vec![0x00, 0x10, 0x02])
}

pub fn delta() -> EncodedUnit {
    EncodedUnit::new(SampleType::Vp8, vec![0x01, 0x10, 0x02])
}

pub fn corrupt_delta() -> EncodedUnit {
    EncodedUnit::new(SampleType::Vp8, vec![0x01, CORRUPT])
}

/// Counters observed from outside the stage
#[derive(Debug, Default)]
pub struct CodecProbe {
    pub init_calls: AtomicU64,
    pub decode_calls: AtomicU64,
    pub frames_yielded: AtomicU64,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CodecProbe {
    pub fn init_calls(&self) -> u64 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn decode_calls(&self) -> u64 {
        self.decode_calls.load(Ordering::SeqCst)
    }

    pub fn frames_yielded(&self) -> u64 {
        self.frames_yielded.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Codec producing one frame (2x2 unless configured) per accepted unit
///
/// Frame luma encodes the decode count (1, 2, ...) so tests can tell frames
/// apart. Units whose second byte is [`CORRUPT`] are rejected.
pub struct ScriptedCodec {
    probe: Arc<CodecProbe>,
    initialized: bool,
    fail_init: bool,
    buffering: bool,
    work: Duration,
    frame_size: (u32, u32),
    ready: VecDeque<YCbCrImage>,
}

impl ScriptedCodec {
    pub fn new() -> (Self, Arc<CodecProbe>) {
        let probe = Arc::new(CodecProbe::default());
        (
            Self {
                probe: probe.clone(),
                initialized: false,
                fail_init: false,
                buffering: false,
                work: Duration::ZERO,
                frame_size: (2, 2),
                ready: VecDeque::new(),
            },
            probe,
        )
    }

    /// Make `initialize` fail
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Accept units without ever producing a frame
    pub fn buffering(mut self) -> Self {
        self.buffering = true;
        self
    }

    /// Spend `work` inside every codec call
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    /// Produce frames of the given dimensions
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    fn enter(&self) {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
    }

    fn exit(&self) {
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CodecContext for ScriptedCodec {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.enter();
        self.probe.init_calls.fetch_add(1, Ordering::SeqCst);
        self.exit();
        if self.fail_init {
            bail!("no decoder available");
        }
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn decode(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.enter();
        let calls = self.probe.decode_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = if payload.get(1) == Some(&CORRUPT) {
            Err(anyhow::anyhow!("corrupt partition"))
        } else {
            if !self.buffering {
                let (w, h) = self.frame_size;
                self.ready
                    .push_back(YCbCrImage::filled(w, h, calls as u8, 128, 128));
            }
            Ok(())
        };
        self.exit();
        result
    }

    fn next_frame(&mut self) -> Option<YCbCrImage> {
        self.enter();
        let frame = self.ready.pop_front();
        if frame.is_some() {
            self.probe.frames_yielded.fetch_add(1, Ordering::SeqCst);
        }
        self.exit();
        frame
    }
}

/// Sink recording every accepted sample
#[derive(Default)]
pub struct RecordingSink {
    samples: Mutex<Vec<Sample>>,
    reject: AtomicBool,
    closed: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FrameSink for RecordingSink {
    fn accept(&self, sample: Sample) -> anyhow::Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            bail!("display busy");
        }
        self.samples.lock().unwrap().push(sample);
        Ok(())
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer collecting reported errors
#[derive(Default)]
pub struct CollectingObserver {
    errors: Mutex<Vec<(String, Error)>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<(String, Error)> {
        self.errors.lock().unwrap().clone()
    }
}

impl StageObserver for CollectingObserver {
    fn on_error(&self, stage: &str, error: &Error) {
        self.errors
            .lock()
            .unwrap()
            .push((stage.to_string(), error.clone()));
    }
}
