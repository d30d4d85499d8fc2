//! Diagnostic trace sink handed to the step by the host.
//!
//! The host accepts a format string with positional `{0}`, `{1}`, ...
//! placeholders and a list of arguments. Output is operational only: a
//! sink never fails and never influences the outcome of an invocation.

use std::fmt::Display;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::telemetry::TRACE_TARGET;

/// Host-provided diagnostic sink.
pub trait TraceSink: Send + Sync {
    fn trace(&self, format: &str, args: &[&dyn Display]);
}

/// Substitute positional placeholders.
///
/// `{{` and `}}` produce literal braces. A placeholder whose index has no
/// argument is emitted unchanged.
pub fn render(format: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                let closed = chars.peek() == Some(&'}');
                match digits.parse::<usize>().ok().and_then(|i| args.get(i)) {
                    Some(arg) if closed => {
                        chars.next();
                        out.push_str(&arg.to_string());
                    }
                    _ => {
                        out.push('{');
                        out.push_str(&digits);
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Forwards trace output to `tracing` at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&self, format: &str, args: &[&dyn Display]) {
        tracing::info!(target: TRACE_TARGET, "{}", render(format, args));
    }
}

/// A captured trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Captures rendered trace lines in memory.
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    entries: Mutex<Vec<TraceEntry>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TraceEntry> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TraceEntry>> {
        // A poisoned log is still a usable log.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl TraceSink for MemoryTraceSink {
    fn trace(&self, format: &str, args: &[&dyn Display]) {
        let entry = TraceEntry {
            message: render(format, args),
            recorded_at: Utc::now(),
        };
        self.lock().push(entry);
    }
}
