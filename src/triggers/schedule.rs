use super::{Trigger, TriggerError};
use crate::shutdown::Shutdown;
use duration_string::DurationString;
use log::{debug, info};
use std::{
    sync::mpsc::{SendError, SyncSender},
    time::Duration,
};
use thiserror::Error;

/// A trigger that runs the checks periodically.
///
/// The first check happens one interval after the start. If a check takes
/// longer than the interval, the next one waits until it finishes, so they
/// never overlap.
pub struct ScheduleTrigger {
    duration: Duration,
}

/// Custom error describing the error cases for the ScheduleTrigger.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Cannot send trigger with Sender. This usually because the receiver is dropped.
    #[error("cannot trigger changes, receiver hang up")]
    ReceiverHangup(#[from] SendError<Option<()>>),
}

impl From<ScheduleError> for TriggerError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::ReceiverHangup(err) => TriggerError::ReceiverHangup(err),
        }
    }
}

impl ScheduleTrigger {
    /// Creates a new ScheduleTrigger with duration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Runs one step in the scheduled time process: waits the duration and triggers.
    /// Returns false without triggering if the shutdown was requested while waiting.
    pub fn step(
        &self,
        tx: &SyncSender<Option<()>>,
        shutdown: &Shutdown,
    ) -> Result<bool, ScheduleError> {
        if shutdown.wait_timeout(self.duration) {
            return Ok(false);
        }

        tx.send(Some(()))?;
        Ok(true)
    }
}

impl Trigger for ScheduleTrigger {
    /// Starts a scheduled trigger, running the steps in a loop until the shutdown.
    fn listen(&self, tx: SyncSender<Option<()>>, shutdown: Shutdown) -> Result<(), TriggerError> {
        info!(
            "Checking repositories every {}.",
            DurationString::new(self.duration)
        );

        while self.step(&tx, &shutdown)? {}

        debug!("Schedule stopped.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc, thread, time::Instant};

    #[test]
    fn it_should_be_created_from_duration() {
        let trigger = ScheduleTrigger::new(Duration::from_millis(100));
        assert_eq!(Duration::from_millis(100), trigger.duration);
    }

    #[test]
    fn it_should_trigger_every_100_ms() -> Result<(), ScheduleError> {
        let trigger = ScheduleTrigger::new(Duration::from_millis(100));
        let (tx, rx) = mpsc::sync_channel::<Option<()>>(1);
        let shutdown = Shutdown::new();

        for _ in 0..5 {
            let start = Instant::now();

            let should_continue = trigger.step(&tx, &shutdown)?;
            assert!(should_continue);

            // It should be close to the timings
            let _ = rx.recv().unwrap();
            let diff = start.elapsed();
            assert!(diff >= Duration::from_millis(95));
            assert!(diff <= Duration::from_millis(150));
        }

        Ok(())
    }

    #[test]
    fn it_should_stop_on_shutdown() -> Result<(), ScheduleError> {
        let trigger = ScheduleTrigger::new(Duration::from_secs(10));
        let (tx, rx) = mpsc::sync_channel::<Option<()>>(1);
        let shutdown = Shutdown::new();

        let canceller = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let start = Instant::now();
        let should_continue = trigger.step(&tx, &shutdown)?;

        assert!(!should_continue);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(rx.try_recv().is_err());
        handle.join().unwrap();

        Ok(())
    }

    #[test]
    fn it_should_not_trigger_on_a_send_error() {
        let trigger = ScheduleTrigger::new(Duration::from_millis(10));
        let (tx, rx) = mpsc::sync_channel::<Option<()>>(1);

        // Close receiving end, to create a send error
        drop(rx);

        let result = trigger.step(&tx, &Shutdown::new());

        // It should fail, because of ReceiverHangup
        assert!(
            matches!(result, Err(ScheduleError::ReceiverHangup(_)),),
            "{result:?} should be ReceiverHangup"
        );
    }
}
