//! # Overview
//!
//! User-space half of a kernel-instrumented network tracer. Two independent
//! pipelines bridge fixed-layout kernel data to application-level output:
//!
//! * Telemetry decoding: probes write 32-byte log records into a per-CPU perf
//!   event array. [`decoder::TelemetryDecoder`] drains it, resolves each
//!   record's message code through a [`catalog::MessageCatalog`] and routes the
//!   rendered line to a leveled [`sink::LogSink`].
//! * Capture replay: [`replay::CaptureReplayEncoder`] serializes packet
//!   metadata and bytes into classic pcap per-packet frames.
//!
//! # Log record layout
//!
//! Little-endian, 32 bytes:
//! * level: u32 (0 = error, 1 = info, 2 = debug, anything else is dropped)
//! * code: u32
//! * arg1, arg2, arg3: u64
//!
//! # Replay frame layout
//!
//! Little-endian 16-byte header followed by `incl_len` bytes of packet data:
//! * ts_sec: u32
//! * ts_frac: u32 (microseconds by default, nanoseconds when selected)
//! * incl_len: u32
//! * orig_len: u32
#![deny(warnings, clippy::all)]

pub mod catalog;
pub mod config;
pub mod decoder;
pub mod error;
pub mod opts;
pub mod perf;
pub mod prelude;
pub mod record;
pub mod replay;
pub mod ring;
pub mod sink;
pub mod supervisor;
pub mod tracing;
pub mod types;
