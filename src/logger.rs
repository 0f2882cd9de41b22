//! Diagnostics sink handed to the pipeline and to every plugin.
//!
//! The pipeline reports through the [`Logger`] trait and never branches on
//! what the logger does. [`TracingLogger`] forwards to `tracing` (the binary
//! installs a `tracing-subscriber` formatter); [`BufferedLogger`] keeps the
//! most recent lines in memory for callers that render their own output.

use crate::jobs::Queue;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Success => "success",
        };
        f.write_str(s)
    }
}

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);
}

/// Forwards to the `tracing` macros under the `vaultpress` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "vaultpress", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "vaultpress", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "vaultpress", "{message}");
    }

    fn success(&self, message: &str) {
        tracing::info!(target: "vaultpress", status = "success", "{message}");
    }
}

/// A logged line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

/// Keeps the last `max_lines` messages.
#[derive(Debug)]
pub struct BufferedLogger {
    lines: Mutex<Queue<LogLine>>,
}

impl BufferedLogger {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Mutex::new(Queue::new(max_lines)),
        }
    }

    fn push(&self, level: Level, message: &str) {
        // A poisoned lock only means another thread panicked mid-push.
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.enqueue(LogLine {
            level,
            message: message.to_string(),
        });
    }

    pub fn lines(&self) -> Vec<LogLine> {
        match self.lines.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Messages logged at `level`, oldest first.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == level)
            .map(|l| l.message)
            .collect()
    }
}

impl Default for BufferedLogger {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Logger for BufferedLogger {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn success(&self, message: &str) {
        self.push(Level::Success, message);
    }
}
