use crate::executor::ExecutorError;
use thiserror::Error;

/// An action to run an Ansible playbook.
pub mod playbook;

/// A custom error for describing the error cases for actions
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required tool is missing or cannot report its version.
    #[error("{0} is not available: {1}")]
    ToolUnavailable(String, #[source] ExecutorError),
    /// The action started, but failed or timed out.
    #[error("failed while running: {0}")]
    FailedAction(#[source] ExecutorError),
}
