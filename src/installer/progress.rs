//! Progress and event reporting
//!
//! The pipeline never touches presentation state. It pushes [`InstallEvent`]s
//! through a callback, and the host decides how to render them.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Percent complete plus a human-readable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
}

/// Where an operation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Preparing,
    Fetching,
    Extracting,
    Merging,
    FinalizingPortable,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Idle => "idle",
            InstallState::Preparing => "preparing",
            InstallState::Fetching => "fetching",
            InstallState::Extracting => "extracting",
            InstallState::Merging => "merging",
            InstallState::FinalizingPortable => "finalizing portable",
            InstallState::Done => "done",
            InstallState::Cancelled => "cancelled",
            InstallState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Cancelled,
    Failed {
        kind: crate::error::ErrorKind,
        detail: String,
    },
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }
}

/// Everything the pipeline tells its host, in production order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    State(InstallState),
    Progress(ProgressEvent),
    /// Non-fatal problem (cleanup, portable folder)
    Warning(String),
    Finished(OperationOutcome),
}

/// Callback receiving pipeline events
pub type EventCallback = Arc<dyn Fn(InstallEvent) + Send + Sync>;

/// Emits events and keeps progress monotonic within one operation.
///
/// Cheap to clone; clones share the current percentage.
#[derive(Clone)]
pub struct Reporter {
    callback: EventCallback,
    percent: Arc<AtomicU8>,
}

impl Reporter {
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback,
            percent: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Reporter that forwards every event into an unbounded channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self::new(Arc::new(move |event: InstallEvent| {
            // Receiver gone means the host stopped listening; keep working.
            let _ = tx.send(event);
        }));
        (reporter, rx)
    }

    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self::new(Arc::new(|_: InstallEvent| {}))
    }

    /// Last reported percentage
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Report progress. Values below the current percentage are raised to it.
    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        let requested = percent.min(100);
        let previous = self.percent.fetch_max(requested, Ordering::SeqCst);
        let percent = previous.max(requested);
        let message = message.into();
        debug!("Progress: {}% {}", percent, message);
        self.emit(InstallEvent::Progress(ProgressEvent { percent, message }));
    }

    /// Report progress only when it moves forward. Returns whether an event was sent.
    pub fn advance(&self, percent: u8, message: impl FnOnce() -> String) -> bool {
        let requested = percent.min(100);
        let previous = self.percent.fetch_max(requested, Ordering::SeqCst);
        if requested <= previous {
            return false;
        }
        self.emit(InstallEvent::Progress(ProgressEvent {
            percent: requested,
            message: message(),
        }));
        true
    }

    /// Message-only update at the current percentage
    pub fn message(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.emit(InstallEvent::Progress(ProgressEvent {
            percent: self.percent(),
            message,
        }));
    }

    /// Drop progress back to 0; used only for the terminal cancelled/failed event
    pub fn reset(&self, message: impl Into<String>) {
        self.percent.store(0, Ordering::SeqCst);
        self.emit(InstallEvent::Progress(ProgressEvent {
            percent: 0,
            message: message.into(),
        }));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.emit(InstallEvent::Warning(message));
    }

    pub fn state(&self, state: InstallState) {
        debug!("State: {}", state);
        self.emit(InstallEvent::State(state));
    }

    pub fn finished(&self, outcome: OperationOutcome) {
        self.emit(InstallEvent::Finished(outcome));
    }

    fn emit(&self, event: InstallEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("percent", &self.percent())
            .finish_non_exhaustive()
    }
}
