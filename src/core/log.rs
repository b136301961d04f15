//! Minimal logging hook for the session engine.
//!
//! SPTPS has no internal notion of log levels beyond "error" and
//! "warning", and no session ever logs more than a handful of lines over
//! its lifetime (handshake events and replay-window anomalies). A small
//! trait plus two ready-made sinks covers every caller this crate expects
//! without pulling in a logging framework the rest of the crate has no
//! other use for.

use std::fmt;

/// A sink for session log messages.
///
/// `session_label` is whatever the caller passed to identify the session
/// (commonly a peer name); it is opaque to this crate.
pub trait Logger: fmt::Debug {
    /// Log an error condition.
    fn error(&self, session_label: &str, message: &str);

    /// Log a non-fatal warning.
    fn warning(&self, session_label: &str, message: &str);
}

/// Writes every message to stderr. The default logger for new sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn error(&self, session_label: &str, message: &str) {
        eprintln!("[{session_label}] error: {message}");
    }

    fn warning(&self, session_label: &str, message: &str) {
        eprintln!("[{session_label}] warning: {message}");
    }
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuietLogger;

impl Logger for QuietLogger {
    fn error(&self, _session_label: &str, _message: &str) {}
    fn warning(&self, _session_label: &str, _message: &str) {}
}

/// Wraps a closure as a [`Logger`], for callers who want both error and
/// warning lines routed to the same place without implementing the trait.
pub struct FnLogger<F: Fn(&str, bool, &str)>(pub F);

impl<F: Fn(&str, bool, &str)> fmt::Debug for FnLogger<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLogger").finish_non_exhaustive()
    }
}

impl<F: Fn(&str, bool, &str)> Logger for FnLogger<F> {
    fn error(&self, session_label: &str, message: &str) {
        (self.0)(session_label, true, message)
    }

    fn warning(&self, session_label: &str, message: &str) {
        (self.0)(session_label, false, message)
    }
}
