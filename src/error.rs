use crate::types::BufferSize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Encountered a BPF map error. {0}")]
    Map(#[from] aya::maps::MapError),

    #[error("Failed to bind the perf buffer. {0}")]
    PerfBuffer(#[from] aya::maps::perf::PerfBufferError),

    #[error("Failed to enumerate online CPUs, {msg}. {source}")]
    OnlineCpus {
        msg: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("The perf buffer size must be a positive number of bytes, got {0}")]
    InvalidBufferSize(BufferSize),

    #[error(transparent)]
    Catalog(#[from] crate::catalog::CatalogError),

    #[error("Encountered a packet capture error. {0}")]
    Pcap(#[from] pcap::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the configuration file. {0}")]
    Config(#[from] toml::de::Error),

    #[error("Capture timestamps before the Unix epoch can't be encoded")]
    TimestampBeforeEpoch,

    #[error("The telemetry decoder task panicked or was aborted. {0}")]
    DecoderTask(#[from] tokio::task::JoinError),
}
