//! Decode stage
//!
//! Gates on the first keyframe, feeds encoded units to the codec context and
//! forwards decoded frames to the sink, either right after each unit
//! (synchronous delivery) or on the pacing scheduler's clock.
//!
//! The codec context sits behind a single mutex that is held only around the
//! codec calls themselves, never around frame conversion or the sink.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tokio::runtime::Handle;

use super::gate::KeyframeGate;
use super::health::StageHealth;
use super::lock;
use super::pacing::{PacedSource, PacingScheduler};
use super::stage::{FrameSink, LogObserver, StageObserver};
use super::state::StageState;
use super::types::{EncodedUnit, Sample};
use crate::config::DecoderConfig;
use crate::decoder::{CodecContext, DecodedFrame};
use crate::error::{Error, Result};

const STAGE_NAME: &str = "DecoderStage";

/// Decoder stage: turns encoded units of one kind into decoded frames
///
/// A stage is single-use. It waits for a keyframe, runs until `shutdown`
/// (or until the codec fails to initialize) and never restarts. Dropping the
/// stage shuts it down.
pub struct DecoderStage {
    inner: Arc<StageInner>,
}

struct StageInner {
    config: DecoderConfig,
    gate: KeyframeGate,
    codec: Mutex<Box<dyn CodecContext>>,
    state: Mutex<StageState>,
    init_error: OnceLock<Error>,
    pacing: Mutex<Option<PacingScheduler>>,
    runtime: Option<Handle>,
    sink: Arc<dyn FrameSink>,
    observer: Arc<dyn StageObserver>,
    health: Arc<StageHealth>,
    sequence: AtomicU64,
}

/// What `submit` does with a unit of the configured kind
enum Admission {
    /// Gate just opened on this unit
    Opened,
    Decode,
    /// Not a keyframe while waiting for one
    Discard,
    /// Stage no longer running
    Closed,
}

impl DecoderStage {
    /// Create a stage reporting paced-delivery errors to the log
    pub fn new(
        config: DecoderConfig,
        codec: Box<dyn CodecContext>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self> {
        Self::with_observer(config, codec, sink, Arc::new(LogObserver))
    }

    /// Create a stage reporting paced-delivery errors to `observer`
    ///
    /// Paced stages capture the current tokio runtime to run their pacing
    /// task and fail with [`Error::NoRuntime`] outside of one.
    pub fn with_observer(
        config: DecoderConfig,
        codec: Box<dyn CodecContext>,
        sink: Arc<dyn FrameSink>,
        observer: Arc<dyn StageObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = if config.is_async() {
            Some(Handle::try_current().map_err(|_| Error::NoRuntime)?)
        } else {
            None
        };

        match config.pacing_period() {
            Some(period) => info!(
                "DecoderStage: {} -> {} paced every {:?}",
                config.codec, config.output, period
            ),
            None => info!(
                "DecoderStage: {} -> {} synchronous",
                config.codec, config.output
            ),
        }

        Ok(Self {
            inner: Arc::new(StageInner {
                gate: KeyframeGate::new(config.codec),
                config,
                codec: Mutex::new(codec),
                state: Mutex::new(StageState::WaitingForKeyframe),
                init_error: OnceLock::new(),
                pacing: Mutex::new(None),
                runtime,
                sink,
                observer,
                health: Arc::new(StageHealth::new()),
                sequence: AtomicU64::new(0),
            }),
        })
    }

    /// Feed one encoded unit to the stage.
    ///
    /// Units of another kind, units arriving before the first keyframe and
    /// units arriving after shutdown are accepted without effect. In
    /// synchronous mode the decoded frame (if any) is forwarded before this
    /// returns and sink errors surface here.
    pub fn submit(&self, unit: &EncodedUnit) -> Result<()> {
        self.inner.submit(unit)
    }

    /// Forward at most one ready frame to the sink
    pub fn drain_and_forward(&self) -> Result<()> {
        self.inner.drain_and_forward()
    }

    /// Stop decoding and delivery. Safe to call more than once.
    ///
    /// A drain already in progress completes; the pacing task exits without
    /// running another tick. The sink is closed on the first call.
    pub fn shutdown(&self) {
        self.inner.shutdown()
    }

    /// Wait for the pacing task to exit after `shutdown`
    pub async fn join(&self) {
        let task = lock(&self.inner.pacing)
            .as_mut()
            .and_then(PacingScheduler::take_task);
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!("DecoderStage: pacing task ended abnormally: {}", e);
        }
    }

    pub fn name(&self) -> &'static str {
        STAGE_NAME
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.inner.config
    }

    /// Get current lifecycle state
    pub fn state(&self) -> StageState {
        *lock(&self.inner.state)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Whether a pacing task was ever started for this stage
    pub fn has_scheduler(&self) -> bool {
        lock(&self.inner.pacing).is_some()
    }

    /// Whether the pacing task is still alive
    pub fn is_pacing(&self) -> bool {
        lock(&self.inner.pacing)
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }

    /// Get health metrics
    pub fn health(&self) -> Arc<StageHealth> {
        self.inner.health.clone()
    }
}

impl Drop for DecoderStage {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl StageInner {
    fn submit(self: &Arc<Self>, unit: &EncodedUnit) -> Result<()> {
        if let Some(err) = self.init_error.get() {
            return Err(err.clone());
        }
        if unit.kind != self.config.codec {
            self.health.record_ignored();
            return Ok(());
        }
        self.health.record_received();

        match self.admit(&unit.payload) {
            Admission::Closed => return Ok(()),
            Admission::Discard => {
                self.health.record_discarded();
                return Ok(());
            }
            Admission::Opened => info!(
                "DecoderStage: received first {} keyframe",
                self.gate.kind()
            ),
            Admission::Decode => {}
        }

        self.decode(&unit.payload)?;

        if self.config.is_async() {
            return Ok(());
        }
        self.drain_and_forward()
    }

    /// Consult the lifecycle (and the gate while waiting) for one unit
    fn admit(self: &Arc<Self>, payload: &[u8]) -> Admission {
        let mut state = lock(&self.state);
        match *state {
            StageState::Running { .. } => Admission::Decode,
            StageState::Failed | StageState::Stopped => Admission::Closed,
            StageState::WaitingForKeyframe => {
                if !self.gate.is_keyframe(payload) {
                    return Admission::Discard;
                }
                let running = StageState::Running {
                    started_at: Instant::now(),
                };
                debug_assert!(state.can_transition_to(&running));
                *state = running;

                if let (Some(runtime), Some(period)) = (&self.runtime, self.config.pacing_period())
                {
                    let scheduler = PacingScheduler::spawn(runtime, period, Arc::downgrade(self));
                    *lock(&self.pacing) = Some(scheduler);
                }
                Admission::Opened
            }
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<()> {
        let mut codec = lock(&self.codec);
        let mut initialized_now = false;

        if !codec.is_initialized() {
            // A concurrent caller may have failed initialization while we waited
            if let Some(err) = self.init_error.get() {
                return Err(err.clone());
            }
            if let Err(e) = codec.initialize() {
                let err = self
                    .init_error
                    .get_or_init(|| Error::InitFailed(format!("{e:#}")))
                    .clone();
                drop(codec);
                self.mark_failed();
                return Err(err);
            }
            initialized_now = true;
        }

        let result = codec.decode(payload);
        drop(codec);

        if initialized_now {
            debug!("DecoderStage: {} codec initialized", self.config.codec);
        }

        match result {
            Ok(()) => {
                self.health.record_decoded();
                Ok(())
            }
            Err(e) => {
                self.health.record_decode_failure();
                Err(Error::DecodeFailed(format!("{e:#}")))
            }
        }
    }

    fn mark_failed(&self) {
        self.health.record_init_failure();
        {
            let mut state = lock(&self.state);
            if state.can_transition_to(&StageState::Failed) {
                *state = StageState::Failed;
            }
        }
        if let Some(pacing) = lock(&self.pacing).as_ref() {
            pacing.stop();
        }
        info!("DecoderStage: codec unavailable, stage disabled");
    }

    fn drain_and_forward(&self) -> Result<()> {
        if !lock(&self.state).is_running() {
            return Ok(());
        }

        let image = {
            let mut codec = lock(&self.codec);
            if codec.is_initialized() {
                codec.next_frame()
            } else {
                None
            }
        };
        self.health.record_drain(image.is_some());

        let Some(image) = image else {
            return Ok(());
        };

        let frame = DecodedFrame::from_image(image, self.config.output);
        let sample = Sample::new(self.sequence.fetch_add(1, Ordering::Relaxed), frame);
        let size = sample.size();

        match self.sink.accept(sample) {
            Ok(()) => {
                self.health.record_forwarded(size);
                Ok(())
            }
            Err(e) => {
                self.health.record_sink_rejection();
                Err(Error::SinkRejected(format!("{e:#}")))
            }
        }
    }

    fn shutdown(&self) {
        let previous = {
            let mut state = lock(&self.state);
            let previous = *state;
            *state = StageState::Stopped;
            previous
        };

        if let Some(pacing) = lock(&self.pacing).as_ref() {
            pacing.stop();
        }

        if previous == StageState::Stopped {
            return;
        }
        info!(
            "DecoderStage: stopped (was {}). {}",
            previous,
            self.health.summary()
        );
        self.sink.close();
    }
}

impl PacedSource for StageInner {
    fn is_active(&self) -> bool {
        lock(&self.state).is_running()
    }

    fn tick(&self) -> Result<()> {
        self.drain_and_forward()
    }

    fn report(&self, error: &Error) {
        self.observer.on_error(STAGE_NAME, error);
    }
}
