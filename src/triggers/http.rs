use super::{Trigger, TriggerError};
use crate::shutdown::Shutdown;
use log::{debug, info, warn};
use std::{
    sync::mpsc::{SyncSender, TrySendError},
    time::Duration,
};
use tiny_http::{Response, Server};

/// How long we wait for a request before looking at the shutdown token again.
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(100);

/// A trigger that runs on an HTTP request.
///
/// This could be used to trigger checks from git remotes (e.g. GitHub, GitLab) with webhooks.
/// Given that your server can be reached from the outside, you can pass your server's hostname
/// or IP address and have the playbook running on git changes immediately.
pub struct HttpTrigger {
    http: String,
}

impl HttpTrigger {
    /// Create an new HTTP trigger with a HTTP url. It accepts an address as a string,
    /// for example "0.0.0.0:1234".
    pub fn new(http: String) -> Self {
        Self { http }
    }
}

impl Trigger for HttpTrigger {
    /// Starts a minimal HTTP 1.1 server, that triggers on every request.
    ///
    /// Every method and every URL returns 200 status code with plaintext "OK".
    /// Requests arriving while a check is already waiting are merged into that check.
    fn listen(&self, tx: SyncSender<Option<()>>, shutdown: Shutdown) -> Result<(), TriggerError> {
        let listener = Server::http(&self.http).map_err(|err| {
            TriggerError::Misconfigured(format!("cannot start server on {}: {err}", self.http))
        })?;
        info!("Listening on {}...", self.http);

        while !shutdown.is_cancelled() {
            let request = match listener.recv_timeout(ACCEPT_TIMEOUT) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(err) => return Err(TriggerError::FailedTrigger(err.to_string())),
            };
            debug!("Received request on {} {}.", request.method(), request.url());

            match tx.try_send(Some(())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("A check is already waiting."),
                Err(TrySendError::Disconnected(value)) => {
                    let _ = request.respond(Response::from_string("OK"));
                    return Err(TriggerError::ReceiverHangup(std::sync::mpsc::SendError(value)));
                }
            }

            if let Err(err) = request.respond(Response::from_string("OK")) {
                warn!("Cannot respond to the request: {err}.");
            }
        }

        debug!("HTTP server stopped.");
        Ok(())
    }
}
