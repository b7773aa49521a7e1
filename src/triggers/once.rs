use super::{Trigger, TriggerError};
use crate::shutdown::Shutdown;
use std::sync::mpsc::SyncSender;

/// A trigger that runs the checks once and then exits.
pub struct OnceTrigger;

impl Trigger for OnceTrigger {
    /// Starts a trigger that runs once and terminates after.
    fn listen(&self, tx: SyncSender<Option<()>>, _shutdown: Shutdown) -> Result<(), TriggerError> {
        tx.send(Some(()))?;
        tx.send(None)?;
        Ok(())
    }
}
