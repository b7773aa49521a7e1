use crate::shutdown::Shutdown;
use mockall::automock;
use std::sync::mpsc::{SendError, SyncSender};
use thiserror::Error;

/// A trigger that runs on an HTTP request.
pub mod http;
/// A trigger that runs the checks once and then exits.
pub mod once;
/// A trigger that runs the checks periodically.
pub mod schedule;
/// A trigger that terminates the program on a signal.
pub mod signal;

/// A custom error for describing the error cases for triggers
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Cannot initialize trigger, because it has a misconfiguration.
    #[error("not configured correctly: {0}")]
    Misconfigured(String),
    /// Cannot send trigger with Sender. This usually because the receiver is dropped.
    #[error("cannot trigger changes, receiver hang up")]
    ReceiverHangup(#[from] SendError<Option<()>>),
    /// Running the trigger failed.
    #[error("{0}")]
    FailedTrigger(String),
}

/// A trigger is a long running background process, which initiates the reconciliation.
///
/// It sends `Some(())` to request a check and `None` to request the shutdown.
/// The channel is bounded, so a trigger blocks while a check is already waiting.
///
/// Triggers may include:
///   - schedules ([schedule::ScheduleTrigger])
///   - HTTP servers ([http::HttpTrigger])
///   - signals ([signal::SignalTrigger])
#[automock]
pub trait Trigger: Sync + Send {
    /// Start the trigger process, returning when it has nothing more to send
    /// or the shutdown is requested.
    fn listen(&self, tx: SyncSender<Option<()>>, shutdown: Shutdown) -> Result<(), TriggerError>;
}
