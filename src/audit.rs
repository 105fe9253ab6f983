//! Audit trail of masking decisions.
//!
//! The audit stream is separate from diagnostic logging: it records what
//! was masked, where, and on whose word. A sink is handed to the
//! [`crate::Redactor`] at construction, so concurrent documents can write
//! to independent sinks.
//!
//! ```text
//! === document (412 chars) ===
//! [PHONE_NUMBER_JP] "090-1234-5678" (score: 1.00, pos: 4-17)
//! [JP_PERSON] "山田太郎" (pattern: JP_PERSON 0.85, precision: PERSON 0.97, pos: 0-4)
//! Total: 2 entities masked
//! ```

use parking_lot::Mutex;
use std::io::Write;

/// One auditable event.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent<'a> {
    /// Analysis of a document begins.
    DocumentStart {
        /// Length of the normalized text.
        chars: usize,
    },
    /// A span will be masked.
    Masked {
        /// Entity type.
        entity_type: &'a str,
        /// Text being masked.
        excerpt: &'a str,
        /// Final score.
        score: f64,
        /// Start (char offset).
        start: usize,
        /// End (char offset).
        end: usize,
    },
    /// A span will be masked and two detector groups agreed on it.
    Consensus {
        /// Entity type (rule side).
        entity_type: &'a str,
        /// Text being masked.
        excerpt: &'a str,
        /// Rule-side label.
        pattern_type: &'a str,
        /// Rule-side raw score.
        pattern_score: f64,
        /// Precision-side label.
        precision_type: &'a str,
        /// Precision-side raw score.
        precision_score: f64,
        /// Start (char offset).
        start: usize,
        /// End (char offset).
        end: usize,
    },
    /// A detector span was dropped before becoming a candidate.
    Discarded {
        /// Detector that produced it.
        source: &'a str,
        /// Its label.
        entity_type: &'a str,
        /// Its start.
        start: usize,
        /// Its end.
        end: usize,
        /// Why.
        reason: &'a str,
    },
    /// Analysis of a document ended.
    DocumentEnd {
        /// Number of masked spans.
        total: usize,
    },
}

impl AuditEvent<'_> {
    /// One-line rendering.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            AuditEvent::DocumentStart { chars } => format!("=== document ({chars} chars) ==="),
            AuditEvent::Masked {
                entity_type,
                excerpt,
                score,
                start,
                end,
            } => format!("[{entity_type}] \"{excerpt}\" (score: {score:.2}, pos: {start}-{end})"),
            AuditEvent::Consensus {
                entity_type,
                excerpt,
                pattern_type,
                pattern_score,
                precision_type,
                precision_score,
                start,
                end,
            } => format!(
                "[{entity_type}] \"{excerpt}\" (pattern: {pattern_type} {pattern_score:.2}, \
                 precision: {precision_type} {precision_score:.2}, pos: {start}-{end})"
            ),
            AuditEvent::Discarded {
                source,
                entity_type,
                start,
                end,
                reason,
            } => format!("[discarded] {entity_type} {start}-{end} from {source}: {reason}"),
            AuditEvent::DocumentEnd { total } => format!("Total: {total} entities masked"),
        }
    }
}

/// Receiver of audit events. Must tolerate concurrent calls.
pub trait AuditSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &AuditEvent<'_>);
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AuditSink for NullSink {
    fn record(&self, _event: &AuditEvent<'_>) {}
}

/// Forwards rendered lines to `log::info!` under target `masque::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn record(&self, event: &AuditEvent<'_>) {
        log::info!(target: "masque::audit", "{}", event.render());
    }
}

/// Collects rendered lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl AuditSink for MemorySink {
    fn record(&self, event: &AuditEvent<'_>) {
        self.lines.lock().push(event.render());
    }
}

/// Writes one line per event to any writer, e.g. a per-document log file.
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> AuditSink for WriterSink<W> {
    fn record(&self, event: &AuditEvent<'_>) {
        let mut w = self.writer.lock();
        if let Err(e) = writeln!(w, "{}", event.render()) {
            log::warn!("audit write failed: {e}");
        }
    }
}
