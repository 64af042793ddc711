use crate::decoder::{PollExit, TelemetryDecoder};
use crate::error::Error;
use crate::ring::{CloseHandle, RecordSource};
use crate::sink::LogSink;
use tokio::task::JoinHandle;

/// A telemetry decoder running on its own task.
///
/// The task never restarts itself. Hosts that want resilience inspect the
/// [`PollExit`] returned by [`DecoderTask::join`] and spawn a fresh decoder.
#[derive(Debug)]
pub struct DecoderTask {
    close: CloseHandle,
    join: JoinHandle<PollExit>,
}

impl DecoderTask {
    pub fn spawn<S, K>(decoder: TelemetryDecoder<S, K>) -> Self
    where
        S: RecordSource + 'static,
        K: LogSink + 'static,
    {
        let close = decoder.close_handle();
        let join = tokio::spawn(decoder.poll());
        DecoderTask { close, join }
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Ask the polling loop to stop; it returns [`PollExit::Closed`] promptly.
    pub fn close(&self) {
        self.close.close()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<PollExit, Error> {
        Ok(self.join.await?)
    }

    /// Close the loop and wait for it to exit.
    pub async fn shutdown(self) -> Result<PollExit, Error> {
        self.close();
        self.join().await
    }
}
