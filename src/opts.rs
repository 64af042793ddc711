use crate::types::{BufferSize, Snaplen, TimestampUnit};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct TracerOpts {
    /// Use configuration from file
    #[clap(long = "config", name = "config file")]
    pub config_file: Option<PathBuf>,

    /// Enable debug logging, including debug-level messages from the probes
    #[clap(long)]
    pub debug: bool,

    /// Path of the pinned perf event array the probes write log records into
    #[clap(long, name = "pin path", help_heading = "LOG BUFFER CONFIGURATION")]
    pub log_map_pin: Option<PathBuf>,

    /// Size in bytes of each per-CPU log buffer, rounded up to a power-of-two
    /// number of pages (default: one page)
    #[clap(long, name = "bytes", help_heading = "LOG BUFFER CONFIGURATION")]
    pub log_buffer_size: Option<BufferSize>,

    /// Network interface capture replay frames are injected into
    #[clap(long, name = "iface", help_heading = "REPLAY CONFIGURATION")]
    pub replay_interface: Option<String>,

    /// Maximum number of bytes captured per packet (default: 262144)
    #[clap(long, name = "snaplen", help_heading = "REPLAY CONFIGURATION")]
    pub snaplen: Option<Snaplen>,

    /// Resolution of replayed frame timestamps.
    /// * micro (default)
    /// * nano
    #[clap(
        long,
        verbatim_doc_comment,
        name = "unit",
        help_heading = "REPLAY CONFIGURATION"
    )]
    pub timestamp_unit: Option<TimestampUnit>,
}
