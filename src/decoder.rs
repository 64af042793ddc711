use crate::catalog::MessageCatalog;
use crate::record::LogRecord;
use crate::ring::{CloseHandle, RawEvent, ReadError, RecordSource};
use crate::sink::{LogSink, BPF_LOG_PREFIX};
use std::sync::Arc;
use tracing::info;

/// Why the polling loop stopped.
#[derive(Debug)]
pub enum PollExit {
    /// The source was closed through its [`CloseHandle`].
    Closed,
    /// The source failed; the error has already been reported to the sink.
    Failed(ReadError),
}

/// Decodes kernel log records and renders them through a [`MessageCatalog`].
pub struct TelemetryDecoder<S, K> {
    source: S,
    catalog: Arc<MessageCatalog>,
    sink: K,
}

impl<S, K> TelemetryDecoder<S, K>
where
    S: RecordSource,
    K: LogSink,
{
    pub fn new(source: S, catalog: Arc<MessageCatalog>, sink: K) -> Self {
        TelemetryDecoder {
            source,
            catalog,
            sink,
        }
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.source.close_handle()
    }

    /// Run until the source is closed or fails.
    ///
    /// Lost samples and malformed records are reported and skipped. There is
    /// no restart on failure. On either exit the source is closed and dropped,
    /// so every reader feeding it stops and releases its buffer.
    pub async fn poll(mut self) -> PollExit {
        info!("Start polling for bpf logs");

        loop {
            let event = match self.source.read().await {
                Ok(event) => event,
                Err(ReadError::Closed) => return PollExit::Closed,
                Err(e) => {
                    self.sink.error(&format!(
                        "Error reading from bpf logger perf buffer, aborting logger! {e}"
                    ));
                    self.source.close_handle().close();
                    return PollExit::Failed(e);
                }
            };

            match event {
                RawEvent::Lost(count) => self
                    .sink
                    .info(&format!("Log buffer is full, dropped {count} logs")),
                RawEvent::Sample(raw) => match LogRecord::decode(&raw) {
                    Ok(record) => self.dispatch(&record),
                    Err(e) => self.sink.error(&format!("Error parsing log {e}")),
                },
            }
        }
    }

    /// Render a single record and route it by level.
    ///
    /// Unknown codes produce one info line, unsupported levels produce nothing.
    pub fn dispatch(&self, record: &LogRecord) {
        let entry = match self.catalog.get(record.code) {
            Some(entry) => entry,
            None => {
                self.sink.info(&format!(
                    "Unknown message code from bpf logger {}",
                    record.code
                ));
                return;
            }
        };

        if let Some(level) = record.log_level() {
            let msg = entry.format(&record.args);
            self.sink.emit(level, &format!("{BPF_LOG_PREFIX}{msg}"));
        }
    }
}
