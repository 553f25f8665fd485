use std::sync::Arc;

/// Syslog-conventional message priorities, 0 (emergency) through 7 (debug).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    /// The numeric syslog priority.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

/// Per-cluster logging callback. Receives the priority and the formatted
/// message; debug-level messages are only forwarded when the cluster's
/// verbose flag is set.
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Emit a message both to `tracing` and, when configured, to the
/// application's logging callback. Safe to call while the membership lock
/// is held; performs no I/O.
pub(crate) fn emit(logger: Option<&LogCallback>, verbose: bool, level: LogLevel, msg: &str) {
    match level {
        LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
            tracing::error!(target: "slotcluster", "{msg}");
        }
        LogLevel::Warning => tracing::warn!(target: "slotcluster", "{msg}"),
        LogLevel::Notice | LogLevel::Info => tracing::info!(target: "slotcluster", "{msg}"),
        LogLevel::Debug => tracing::debug!(target: "slotcluster", "{msg}"),
    }
    if let Some(cb) = logger {
        if level != LogLevel::Debug || verbose {
            cb(level, msg);
        }
    }
}
