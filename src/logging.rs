//! Tracing setup and an in-memory buffer of indexing diagnostics.
//!
//! Parse failures of individual files are never surfaced in the outline.
//! They are logged at WARN, and the [`DiagnosticsLayer`] keeps the most
//! recent warnings and errors around so a host can show them on demand.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Maximum number of diagnostics kept in memory
const MAX_DIAGNOSTICS: usize = 1000;

/// Messages longer than this are cut before buffering.
const MAX_MESSAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => f.write_str("WARN"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// One captured warning or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub timestamp: String,
    pub severity: Severity,
    pub target: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.timestamp, self.severity, self.target, self.message
        )
    }
}

/// Thread-safe ring buffer of diagnostics
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsBuffer {
    entries: Arc<Mutex<VecDeque<Diagnostic>>>,
}

impl DiagnosticsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic, evicting the oldest once the buffer is full
    pub fn push(&self, diagnostic: Diagnostic) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_back(diagnostic);
            while entries.len() > MAX_DIAGNOSTICS {
                entries.pop_front();
            }
        }
    }

    /// The last `count` diagnostics, oldest first
    pub fn get_last(&self, count: usize) -> Vec<Diagnostic> {
        // try_lock: a diagnostic may be emitted while a reader holds the buffer
        match self.entries.try_lock() {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(count);
                entries.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn get_all(&self) -> Vec<Diagnostic> {
        match self.entries.try_lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.try_lock() {
            Ok(entries) => entries.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tracing layer that copies WARN and ERROR events into a [`DiagnosticsBuffer`].
pub struct DiagnosticsLayer {
    buffer: DiagnosticsBuffer,
}

impl DiagnosticsLayer {
    pub fn new(buffer: DiagnosticsBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &DiagnosticsBuffer {
        &self.buffer
    }

    fn severity(level: &Level) -> Option<Severity> {
        match *level {
            Level::WARN => Some(Severity::Warn),
            Level::ERROR => Some(Severity::Error),
            _ => None,
        }
    }

    fn format_message(event: &Event<'_>) -> String {
        struct MessageVisitor {
            message: String,
        }

        impl tracing::field::Visit for MessageVisitor {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = value.to_string();
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
                if field.name() == "message" {
                    self.message = format!("{value:?}");
                }
            }
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let message = if visitor.message.is_empty() {
            event.metadata().target().to_string()
        } else {
            visitor.message
        };
        truncate_message(message)
    }
}

fn truncate_message(message: String) -> String {
    if message.len() <= MAX_MESSAGE_SIZE {
        return message;
    }
    let mut cut = MAX_MESSAGE_SIZE;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}... [TRUNCATED - original size: {} chars]",
        &message[..cut],
        message.len()
    )
}

impl<S> Layer<S> for DiagnosticsLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(severity) = Self::severity(metadata.level()) else {
            return;
        };

        let timestamp = chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S%.3f UTC")
            .to_string();

        self.buffer.push(Diagnostic {
            timestamp,
            severity,
            target: metadata.target().to_string(),
            message: Self::format_message(event),
        });
    }
}

/// Install the global subscriber: an `EnvFilter` (`RUST_LOG` wins over
/// `level`) and a stderr formatter, plus the diagnostics layer when a buffer
/// is given.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_logging(level: &str, diagnostics: Option<DiagnosticsBuffer>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(diagnostics.map(DiagnosticsLayer::new))
        .try_init();
}
