use serde::Serialize;
use tracing::{error, info, warn};

/// Severity of a collected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A single progress or problem message produced during a transform.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Accumulates diagnostics for the caller while mirroring each one to the
/// tracing subscriber. One collector per transform request; never shared.
#[derive(Debug, Default)]
pub struct Collector {
    messages: Vec<Diagnostic>,
}

impl Collector {
    pub fn new() -> Self {
        Collector::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.messages.push(Diagnostic {
            level: Level::Info,
            message,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(Diagnostic {
            level: Level::Warning,
            message,
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.messages.push(Diagnostic {
            level: Level::Error,
            message,
        });
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Diagnostic> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
