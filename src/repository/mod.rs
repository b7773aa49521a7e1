use crate::executor::{Executor, ExecutorError, Invocation};
use log::{debug, info, warn};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

/// Git commands for watching a local working copy.
pub mod git;

/// A custom error describing the error cases of checking a repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The repository is not tracked, it was not in the configuration.
    #[error("repository {0} is not tracked")]
    Untracked(String),
    /// Cannot switch to the tracked branch. It might not exist or there are local changes.
    #[error("cannot check out branch {0}: {1}")]
    CheckoutFailed(String, #[source] ExecutorError),
    /// Cannot pull the remote changes. This can be a network failure, authentication error or a merge conflict.
    #[error("cannot pull branch {0}: {1}")]
    PullFailed(String, #[source] ExecutorError),
    /// Cannot read the current revision.
    #[error("cannot resolve the current revision: {0}")]
    RevisionFailed(#[source] ExecutorError),
    /// Cannot set up the git configuration.
    #[error("cannot configure git: {0}")]
    ConfigFailed(#[source] ExecutorError),
}

/// The last observed state of a watched repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryState {
    pub path: String,
    pub branch: String,
    /// The last known commit hash, `None` if it couldn't be resolved yet.
    pub revision: Option<String>,
}

/// The result of checking a single repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionChange {
    pub changed: bool,
    pub previous: Option<String>,
    pub revision: String,
}

/// Keeps the last known revision of every watched repository.
///
/// Repositories are checked in the order they were configured. The state only
/// lives in memory, a restart resolves every revision again.
#[derive(Debug)]
pub struct RepositoryTracker {
    branch: String,
    timeout: Duration,
    order: Vec<String>,
    states: HashMap<String, RepositoryState>,
}

impl RepositoryTracker {
    /// Create a tracker where every repository is still unknown. Duplicated paths are tracked once.
    pub fn new(repositories: &[String], branch: &str, timeout: Duration) -> Self {
        let mut order = vec![];
        let mut states = HashMap::new();
        for path in repositories {
            if states.contains_key(path) {
                continue;
            }
            order.push(path.clone());
            states.insert(
                path.clone(),
                RepositoryState {
                    path: path.clone(),
                    branch: branch.to_string(),
                    revision: None,
                },
            );
        }

        RepositoryTracker {
            branch: branch.to_string(),
            timeout,
            order,
            states,
        }
    }

    /// Create a tracker and resolve the current revision of every repository.
    ///
    /// If a repository cannot be resolved, it is logged and left unknown, it will
    /// be retried on every check.
    pub fn initialize(
        executor: &dyn Executor,
        repositories: &[String],
        branch: &str,
        timeout: Duration,
    ) -> Self {
        let mut tracker = RepositoryTracker::new(repositories, branch, timeout);
        for path in tracker.order.clone() {
            match tracker.resolve(executor, &path) {
                Ok(revision) => {
                    info!("Initial revision of {path} (branch {branch}) is {revision}.");
                    tracker.set_revision(&path, revision);
                }
                Err(err) => {
                    warn!("Cannot get the initial revision of {path} (branch {branch}): {err}.");
                }
            }
        }

        tracker
    }

    /// The tracked branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The repository paths in the order they are checked.
    pub fn paths(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, path: &str) -> Option<&RepositoryState> {
        self.states.get(path)
    }

    /// Overwrite the known revision of a tracked repository.
    pub fn set_revision(&mut self, path: &str, revision: String) {
        if let Some(state) = self.states.get_mut(path) {
            state.revision = Some(revision);
        }
    }

    fn run(&self, executor: &dyn Executor, invocation: Invocation) -> Result<String, ExecutorError> {
        debug!("Running {invocation}.");
        executor.run(&invocation)?.success()
    }

    fn checkout(&self, executor: &dyn Executor, path: &str) -> Result<(), RepositoryError> {
        self.run(executor, git::checkout(path, &self.branch, self.timeout))
            .map_err(|err| RepositoryError::CheckoutFailed(self.branch.clone(), err))?;
        Ok(())
    }

    fn rev_parse(&self, executor: &dyn Executor, path: &str) -> Result<String, RepositoryError> {
        let revision = self
            .run(executor, git::rev_parse_head(path, self.timeout))
            .map_err(RepositoryError::RevisionFailed)?;
        Ok(revision.trim().to_string())
    }

    fn resolve(&self, executor: &dyn Executor, path: &str) -> Result<String, RepositoryError> {
        self.checkout(executor, path)?;
        self.rev_parse(executor, path)
    }

    /// Check out the tracked branch, pull the remote changes and compare the new
    /// revision with the last known one.
    ///
    /// The state is only updated if every step succeeded. If the repository was
    /// unknown, the first resolved revision becomes the baseline and doesn't
    /// count as a change.
    pub fn check_and_update(
        &mut self,
        executor: &dyn Executor,
        path: &str,
    ) -> Result<RevisionChange, RepositoryError> {
        let previous = self
            .states
            .get(path)
            .ok_or_else(|| RepositoryError::Untracked(path.to_string()))?
            .revision
            .clone();

        self.checkout(executor, path)?;
        let output = self
            .run(executor, git::pull(path, &self.branch, self.timeout))
            .map_err(|err| RepositoryError::PullFailed(self.branch.clone(), err))?;
        output.lines().for_each(|line| debug!("{line}"));
        let revision = self.rev_parse(executor, path)?;

        let changed = match &previous {
            Some(previous) => *previous != revision,
            None => {
                info!("Resolved the revision of {path} for the first time: {revision}.");
                false
            }
        };
        if previous.as_ref() != Some(&revision) {
            self.set_revision(path, revision.clone());
        }

        Ok(RevisionChange {
            changed,
            previous,
            revision,
        })
    }
}
