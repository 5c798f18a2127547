// Join Events
// Run output emitted while barriers are built, notified and fired

use crate::model::{Outcome, RunId, Threshold};

use tokio::sync::mpsc;

/// Sender for run output events
pub type ProgressSender = mpsc::UnboundedSender<JoinEvent>;

/// Receiver for run output events
pub type ProgressReceiver = mpsc::UnboundedReceiver<JoinEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while coordinating diamond topologies
#[derive(Debug, Clone, PartialEq)]
pub enum JoinEvent {
    /// A run was created and handed to its runner
    RunStarted {
        job: String,
        run: RunId,
        cause: String,
    },

    /// A run recorded its final outcome
    RunCompleted {
        job: String,
        run: RunId,
        outcome: Outcome,
    },

    /// A barrier was attached to the run of its root job
    BarrierAttached {
        job: String,
        run: RunId,
        pending: Vec<String>,
        targets: Vec<String>,
    },

    /// A freshly built barrier waited on one of its own join targets
    BarrierDiscarded {
        job: String,
        run: RunId,
        reason: String,
    },

    /// An upstream barrier was widened with a nested join's jobs
    DependenciesAdded {
        job: String,
        run: RunId,
        added: Vec<String>,
    },

    /// A finished job was removed from a barrier's pending set
    JobReleased {
        barrier_job: String,
        barrier_run: RunId,
        job: String,
        remaining: usize,
    },

    /// Every pending job of a barrier finished
    BarrierCompleted {
        job: String,
        run: RunId,
        outcome: Outcome,
    },

    /// The aggregate outcome did not reach the join threshold
    ThresholdNotMet {
        job: String,
        run: RunId,
        outcome: Outcome,
        threshold: Threshold,
    },

    /// A join target was scheduled on behalf of the barrier's root run
    JoinScheduled { job: String, target: String },

    /// A join target was skipped
    JoinSkipped {
        job: String,
        target: String,
        reason: String,
    },

    /// A post-join action started
    ActionStarted { job: String, action: String },

    /// A post-join action failed; later actions still run
    ActionFailed {
        job: String,
        action: String,
        message: String,
    },

    /// Free-form log line
    Log {
        level: LogLevel,
        message: String,
        job: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl JoinEvent {
    pub fn run_started(job: impl Into<String>, run: RunId, cause: impl Into<String>) -> Self {
        Self::RunStarted {
            job: job.into(),
            run,
            cause: cause.into(),
        }
    }

    pub fn run_completed(job: impl Into<String>, run: RunId, outcome: Outcome) -> Self {
        Self::RunCompleted {
            job: job.into(),
            run,
            outcome,
        }
    }

    pub fn join_skipped(
        job: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::JoinSkipped {
            job: job.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn action_failed(
        job: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ActionFailed {
            job: job.into(),
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>, job: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            job,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, job: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            job,
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>, job: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            job,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: JoinEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: JoinEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: JoinEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
