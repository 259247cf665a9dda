//! Injected logging capability.
//!
//! The original NovAtel EDIE library exposes a process-wide singleton logger
//! manager shared by every decoder instance. Library code must never touch
//! process-wide state, so instead each stateful component (`Framer`,
//! `Parser`, `RangeDecompressor`) takes a `Box<dyn Sink>` at construction and
//! calls it directly. `NullSink` is the default and costs nothing.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// A destination for diagnostic events. Implement this to bridge into
/// whatever logging facade the embedding application already uses.
pub trait Sink: Send + Sync {
    fn log(&self, level: Level, target: &str, message: &str);
}

/// Default sink: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn log(&self, _level: Level, _target: &str, _message: &str) {}
}

/// Collects events in memory; useful in tests and embedding applications
/// that want to inspect what the core logged without wiring up a real sink.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<(Level, String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Level, String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Sink for RecordingSink {
    fn log(&self, level: Level, target: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((level, target.to_string(), message.to_string()));
    }
}
