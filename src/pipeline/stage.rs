//! Collaborators of the decoder stage
//!
//! Defines the downstream sink the stage forwards frames to, a channel-backed
//! sink for wiring stages together, and the observer that receives errors no
//! caller is waiting for.

use anyhow::{anyhow, bail};
use log::warn;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::lock;
use super::types::Sample;
use crate::error::Error;

/// Downstream node receiving decoded frames
///
/// `accept` is called without any stage lock held, from whichever context
/// triggered the drain (the producer in synchronous mode, a tokio worker in
/// paced mode). It should not block for long.
pub trait FrameSink: Send + Sync {
    /// Take ownership of a decoded frame
    fn accept(&self, sample: Sample) -> anyhow::Result<()>;

    /// Called once when the upstream stage shuts down
    fn close(&self) {}
}

/// Frame sink feeding a bounded tokio channel
///
/// A full channel rejects the frame instead of waiting. Closing the sink drops
/// the sender so the receiving end sees the end of the stream.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<Sample>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its output
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Sample>) {
        let (tx, rx) = mpsc::channel::<Sample>(capacity);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tx).as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl FrameSink for ChannelSink {
    fn accept(&self, sample: Sample) -> anyhow::Result<()> {
        let Some(tx) = lock(&self.tx).clone() else {
            bail!("output channel closed");
        };
        tx.try_send(sample).map_err(|e| match e {
            TrySendError::Full(_) => anyhow!("output channel full"),
            TrySendError::Closed(_) => anyhow!("output channel closed"),
        })
    }

    fn close(&self) {
        lock(&self.tx).take();
    }
}

/// Receives errors raised where no caller can handle them
///
/// In paced mode the drain runs on its own task, so failures are reported
/// here instead of being returned.
pub trait StageObserver: Send + Sync {
    fn on_error(&self, stage: &str, error: &Error);
}

/// Observer that logs every reported error
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn on_error(&self, stage: &str, error: &Error) {
        warn!("{}: {}", stage, error);
    }
}
