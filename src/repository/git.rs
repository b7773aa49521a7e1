use super::RepositoryError;
use crate::executor::{Executor, Invocation};
use log::debug;
use std::time::Duration;

const GIT: &str = "git";

/// Switch the working copy at `path` to `branch`.
pub fn checkout(path: &str, branch: &str, timeout: Duration) -> Invocation {
    Invocation::new(GIT, ["-C", path, "checkout", branch], timeout)
}

/// Fetch and merge the remote changes of `branch` into the working copy at `path`.
pub fn pull(path: &str, branch: &str, timeout: Duration) -> Invocation {
    Invocation::new(GIT, ["-C", path, "pull", "origin", branch], timeout)
}

/// Print the commit hash the working copy at `path` currently points to.
pub fn rev_parse_head(path: &str, timeout: Duration) -> Invocation {
    Invocation::new(GIT, ["-C", path, "rev-parse", "HEAD"], timeout)
}

/// The global git settings that authenticate every GitHub remote with the token.
///
/// These contain the token, so they are marked sensitive and never printed.
pub fn credential_settings(user: &str, token: &str, timeout: Duration) -> Vec<Invocation> {
    let mut settings = vec![Invocation::new(
        GIT,
        ["config", "--global", "credential.helper", "store"],
        timeout,
    )];
    if !user.is_empty() {
        settings.push(Invocation::new(
            GIT,
            ["config", "--global", "user.name", user],
            timeout,
        ));
    }
    let rewrite = format!("url.https://{token}@github.com/.insteadOf");
    settings.push(
        Invocation::new(
            GIT,
            ["config", "--global", rewrite.as_str(), "https://github.com/"],
            timeout,
        )
        .sensitive(),
    );

    settings
}

/// Configure git globally, so pulls from GitHub use the given credentials.
pub fn configure_credentials(
    executor: &dyn Executor,
    user: &str,
    token: &str,
    timeout: Duration,
) -> Result<(), RepositoryError> {
    for invocation in credential_settings(user, token, timeout) {
        debug!("Running {invocation}.");
        executor
            .run(&invocation)
            .and_then(|result| result.success())
            .map_err(RepositoryError::ConfigFailed)?;
    }

    Ok(())
}
