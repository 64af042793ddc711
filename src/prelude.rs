pub use crate::catalog::{CatalogEntry, MessageCatalog};
pub use crate::config::{ReplayConfig, TracerConfig};
pub use crate::decoder::{PollExit, TelemetryDecoder};
pub use crate::opts::TracerOpts;
pub use crate::record::{LogLevel, LogRecord};
pub use crate::replay::{CaptureInfo, CaptureReplayEncoder, PacketWriter};
pub use crate::ring::{CloseHandle, EventChannel, RawEvent, ReadError, RecordSource};
pub use crate::sink::{LogSink, TracingSink};
pub use crate::supervisor::DecoderTask;
pub use crate::types::{BufferSize, Snaplen, TimestampUnit};
