use super::{Trigger, TriggerError};
use crate::shutdown::Shutdown;
use log::debug;
use std::sync::{atomic::AtomicU8, mpsc::SyncSender};

/// A trigger that terminates the program on a signal.
///
/// The first signal requests a graceful shutdown: a running check is allowed
/// to finish, including a running playbook. The second signal exits immediately.
pub struct SignalTrigger {
    trigger_count: AtomicU8,
}

impl SignalTrigger {
    pub fn new() -> SignalTrigger {
        SignalTrigger {
            trigger_count: AtomicU8::new(0),
        }
    }

    #[cfg(unix)]
    fn listen_inner<I>(
        &self,
        tx: SyncSender<Option<()>>,
        shutdown: &Shutdown,
        signals: I,
    ) -> Result<(), TriggerError>
    where
        I: IntoIterator<Item = i32>,
    {
        use log::{info, warn};
        use std::{process, sync::atomic::Ordering, thread::sleep, time::Duration};
        for signal in signals.into_iter() {
            let previous = self.trigger_count.fetch_add(1, Ordering::Acquire);
            if previous == 0 {
                info!("Got signal {signal}, shutting down after the running check finished.");
                shutdown.cancel();
                // If a check is already waiting, the loop sees the cancellation before running it.
                if tx.try_send(None).is_err() {
                    debug!("There is a check waiting, it will observe the shutdown.");
                }
            } else {
                // Allow a little time for the clean shutdown to still happen.
                sleep(Duration::from_millis(100));
                warn!("Got signal {signal}, terminating right now.");
                process::exit(signal);
            }
        }

        Ok(())
    }
}

impl Default for SignalTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl Trigger for SignalTrigger {
    /// Starts a trigger that iterates over signals and terminates the program.
    #[cfg(unix)]
    fn listen(&self, tx: SyncSender<Option<()>>, shutdown: Shutdown) -> Result<(), TriggerError> {
        use signal_hook::{
            consts::TERM_SIGNALS,
            iterator::{exfiltrator::SignalOnly, SignalsInfo},
        };
        let mut signals = SignalsInfo::<SignalOnly>::new(TERM_SIGNALS).map_err(|err| {
            TriggerError::Misconfigured(format!("cannot set up signal handler: {err}"))
        })?;
        self.listen_inner(tx, &shutdown, &mut signals)
    }

    #[cfg(not(unix))]
    fn listen(&self, _tx: SyncSender<Option<()>>, _shutdown: Shutdown) -> Result<(), TriggerError> {
        debug!("Signal handlers are not supported on non-unix systems.");

        Ok(())
    }
}
