//! The consumer side of a lossy kernel event buffer.
//!
//! Readers deliver [`RawEvent`]s through an [`EventChannel`]. Closing the
//! channel's [`CloseHandle`] is the only way to stop a blocked
//! [`RecordSource::read`]: once `close` has returned, every in-flight and
//! subsequent `read` resolves to [`ReadError::Closed`].

use async_trait::async_trait;
use aya::maps::perf::PerfBufferError;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// One notification from the kernel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawEvent {
    /// A complete record as written by a probe.
    Sample(Bytes),
    /// The buffer overflowed and this many records were dropped.
    Lost(u64),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("The perf buffer was closed")]
    Closed,

    #[error("All perf buffer readers exited")]
    Disconnected,

    #[error("Failed to read the perf buffer on CPU {cpu}. {source}")]
    Perf {
        cpu: u32,
        #[source]
        source: PerfBufferError,
    },
}

#[async_trait]
pub trait RecordSource: Send {
    /// Block until the next event arrives or the source is closed.
    async fn read(&mut self) -> Result<RawEvent, ReadError>;

    /// Handle that unblocks and terminates `read` from another task.
    fn close_handle(&self) -> CloseHandle;
}

/// Explicit, idempotent cancellation signal shared between a source and its owner.
#[derive(Clone, Debug)]
pub struct CloseHandle(Arc<watch::Sender<bool>>);

impl CloseHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CloseHandle(Arc::new(tx))
    }

    pub fn close(&self) {
        self.0.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    pub fn signal(&self) -> CloseSignal {
        CloseSignal(self.0.subscribe())
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`CloseHandle`].
#[derive(Clone, Debug)]
pub struct CloseSignal(watch::Receiver<bool>);

impl CloseSignal {
    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the handle is closed, or every handle was dropped.
    pub async fn closed(&mut self) {
        let _ = self.0.wait_for(|closed| *closed).await;
    }
}

/// Producer half of an [`EventChannel`], one clone per kernel buffer reader.
#[derive(Clone, Debug)]
pub struct EventFeeder {
    tx: mpsc::Sender<Result<RawEvent, ReadError>>,
    signal: CloseSignal,
}

impl EventFeeder {
    /// Returns false when the channel is closed or its consumer is gone.
    pub async fn send(&mut self, event: Result<RawEvent, ReadError>) -> bool {
        if self.signal.is_closed() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.signal.closed() => false,
            res = self.tx.send(event) => res.is_ok(),
        }
    }

    pub async fn closed(&mut self) {
        self.signal.closed().await
    }
}

/// Merges events from any number of feeders into a single closable source.
#[derive(Debug)]
pub struct EventChannel {
    rx: mpsc::Receiver<Result<RawEvent, ReadError>>,
    close: CloseHandle,
    signal: CloseSignal,
}

impl EventChannel {
    pub fn new(capacity: usize) -> (EventFeeder, EventChannel) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let close = CloseHandle::new();
        let signal = close.signal();
        (
            EventFeeder {
                tx,
                signal: signal.clone(),
            },
            EventChannel { rx, close, signal },
        )
    }
}

#[async_trait]
impl RecordSource for EventChannel {
    async fn read(&mut self) -> Result<RawEvent, ReadError> {
        if self.signal.is_closed() {
            return Err(ReadError::Closed);
        }
        tokio::select! {
            biased;
            _ = self.signal.closed() => Err(ReadError::Closed),
            ev = self.rx.recv() => match ev {
                Some(ev) => ev,
                None if self.signal.is_closed() => Err(ReadError::Closed),
                None => Err(ReadError::Disconnected),
            },
        }
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}
