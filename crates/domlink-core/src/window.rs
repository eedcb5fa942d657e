//! One-way side effects a guest can trigger: modal alerts and console lines.

use std::sync::{Arc, Mutex, PoisonError};

/// Sink for `window.alert` and `console.log` calls.
///
/// Calls run to completion before the guest resumes; there is no way to
/// cancel one.
pub trait Window: Send {
    /// Show a blocking alert.
    fn alert(&mut self, message: &str);

    /// Emit one console line.
    fn console_log(&mut self, message: &str);
}

/// Routes window output through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWindow;

impl Window for LogWindow {
    fn alert(&mut self, message: &str) {
        tracing::warn!(target: "domlink::window", "alert: {}", message);
    }

    fn console_log(&mut self, message: &str) {
        tracing::info!(target: "domlink::window", "{}", message);
    }
}

/// A message captured by [`RecordingWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMessage {
    /// From `alert`
    Alert(String),
    /// From `console_log`
    Log(String),
}

/// Records every message; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingWindow {
    messages: Arc<Mutex<Vec<WindowMessage>>>,
}

impl RecordingWindow {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn messages(&self) -> Vec<WindowMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, message: WindowMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

impl Window for RecordingWindow {
    fn alert(&mut self, message: &str) {
        self.push(WindowMessage::Alert(message.to_string()));
    }

    fn console_log(&mut self, message: &str) {
        self.push(WindowMessage::Log(message.to_string()));
    }
}
