use crate::{
    reconcile::Reconcile,
    shutdown::Shutdown,
    triggers::{Trigger, TriggerError},
};
use log::{debug, error, info};
use std::{
    sync::mpsc,
    thread::{self, sleep},
    time::Duration,
};
use thiserror::Error;

/// A custom error implementation for the start function
#[derive(Debug, Error)]
pub enum StartError {
    #[error("You have to define at least one trigger.")]
    NoTriggers,
    #[error("Trigger failed: {0}.")]
    MisconfiguredTrigger(#[from] TriggerError),
}

/// Log why a trigger stopped.
///
/// During shutdown the receiving side goes away on purpose, so a trigger that
/// can't send anymore is expected and not worth an error.
fn report_trigger_result(result: Result<(), TriggerError>, shutdown: &Shutdown) {
    match result {
        Ok(()) => {}
        Err(err) if shutdown.is_cancelled() => debug!("Trigger stopped during shutdown: {err}."),
        Err(err) => error!("Trigger failed: {err}."),
    }
}

/// The main program loop, that runs the reconciliation on every trigger until the shutdown.
///
/// Checks run one after another on the current thread, a new check never starts
/// while the previous one (including its playbook) is still running. On shutdown
/// it waits `grace` before returning, so in-flight work can observe the cancellation.
pub fn start(
    triggers: Vec<Box<dyn Trigger>>,
    reconciler: &mut dyn Reconcile,
    shutdown: &Shutdown,
    grace: Duration,
) -> Result<(), StartError> {
    if triggers.is_empty() {
        return Err(StartError::NoTriggers);
    }

    let (tx, rx) = mpsc::sync_channel::<Option<()>>(1);
    for trigger in triggers {
        let tx = tx.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            let result = trigger.listen(tx, shutdown.clone());
            report_trigger_result(result, &shutdown);
        });
    }
    drop(tx);

    debug!("Waiting on triggers.");
    while let Ok(Some(())) = rx.recv() {
        if shutdown.is_cancelled() {
            break;
        }

        let outcome = reconciler.tick(shutdown);
        debug!("Check finished: {outcome:?}.");
    }

    if shutdown.is_cancelled() {
        info!("Shutting down.");
        sleep(grace);
    } else {
        // Stop the remaining triggers, e.g. after a single run.
        shutdown.cancel();
    }

    debug!("Finished running.");

    Ok(())
}
