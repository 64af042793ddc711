use crate::record::LogLevel;

/// Fixed tag prefixed to every message decoded from the kernel.
pub const BPF_LOG_PREFIX: &str = "[bpf] ";

/// Leveled text output for the telemetry decoder.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, line: &str);

    fn error(&self, line: &str) {
        self.emit(LogLevel::Error, line)
    }

    fn info(&self, line: &str) {
        self.emit(LogLevel::Info, line)
    }

    fn debug(&self, line: &str) {
        self.emit(LogLevel::Debug, line)
    }
}

/// Routes lines to the installed `tracing` subscriber.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Error => tracing::error!("{line}"),
            LogLevel::Info => tracing::info!("{line}"),
            LogLevel::Debug => tracing::debug!("{line}"),
        }
    }
}

impl<T: LogSink + ?Sized> LogSink for std::sync::Arc<T> {
    fn emit(&self, level: LogLevel, line: &str) {
        (**self).emit(level, line)
    }
}
