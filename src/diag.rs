//! Console diagnostics sink.
//!
//! Normalization and traversal record non-fatal findings here instead of
//! printing inline; the CLI drains pending entries after each header so
//! diagnostics stay interleaved with progress output.

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    pending: Vec<Diagnostic>,
    errors_seen: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.pending.push(Diagnostic { severity: Severity::Warning, message: message.into() });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors_seen += 1;
        self.pending.push(Diagnostic { severity: Severity::Error, message: message.into() });
    }

    pub fn pending(&self) -> &[Diagnostic] {
        &self.pending
    }

    /// Errors recorded over the whole run, including already-drained ones.
    pub fn errors_seen(&self) -> usize {
        self.errors_seen
    }

    /// Print pending entries to stderr and clear them.
    pub fn drain_print(&mut self) {
        for d in self.pending.drain(..) {
            match d.severity {
                Severity::Warning => eprintln!("{} {}", "warning:".yellow().bold(), d.message),
                Severity::Error => eprintln!("{} {}", "error:".red().bold(), d.message),
            }
        }
    }
}
