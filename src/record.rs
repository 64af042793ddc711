use crate::catalog::MAX_ARGS;
use derive_more::Display;
use thiserror::Error;

/// Size of a kernel log record on the wire.
pub const LOG_RECORD_SIZE: usize = 32;

/// Severity levels the probes use, matching the constants in the probes' log header.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub enum LogLevel {
    #[display(fmt = "error")]
    Error,
    #[display(fmt = "info")]
    Info,
    #[display(fmt = "debug")]
    Debug,
}

impl LogLevel {
    pub const fn from_raw(level: u32) -> Option<Self> {
        match level {
            0 => Some(LogLevel::Error),
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Log record is {0} bytes, expected at least 32")]
    TooShort(usize),
}

/// A single log event emitted by a probe.
///
/// Layout (little-endian): `level: u32, code: u32, arg1: u64, arg2: u64, arg3: u64`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LogRecord {
    pub level: u32,
    pub code: u32,
    pub args: [u64; MAX_ARGS],
}

impl LogRecord {
    /// Decode a record from the front of a raw perf sample.
    ///
    /// Samples are padded by the kernel, so trailing bytes are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let raw: &[u8; LOG_RECORD_SIZE] = raw
            .get(..LOG_RECORD_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::TooShort(raw.len()))?;

        let u32_at = |off: usize| {
            let mut b = [0_u8; 4];
            b.copy_from_slice(&raw[off..off + 4]);
            u32::from_le_bytes(b)
        };
        let u64_at = |off: usize| {
            let mut b = [0_u8; 8];
            b.copy_from_slice(&raw[off..off + 8]);
            u64::from_le_bytes(b)
        };

        Ok(LogRecord {
            level: u32_at(0),
            code: u32_at(4),
            args: [u64_at(8), u64_at(16), u64_at(24)],
        })
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::from_raw(self.level)
    }

    #[cfg(test)]
    pub(crate) fn encode(&self) -> [u8; LOG_RECORD_SIZE] {
        let mut out = [0_u8; LOG_RECORD_SIZE];
        out[0..4].copy_from_slice(&self.level.to_le_bytes());
        out[4..8].copy_from_slice(&self.code.to_le_bytes());
        for (i, arg) in self.args.iter().enumerate() {
            let off = 8 + i * 8;
            out[off..off + 8].copy_from_slice(&arg.to_le_bytes());
        }
        out
    }
}
