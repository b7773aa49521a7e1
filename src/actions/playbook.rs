use super::ActionError;
use crate::executor::{Executor, Invocation};
use log::{debug, info};
use std::time::Duration;

/// The default executable running the playbooks.
pub const PLAYBOOK_PROGRAM: &str = "ansible-playbook";
/// The default package manager installing roles and collections for the playbooks.
pub const GALAXY_PROGRAM: &str = "ansible-galaxy";

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// An action to apply an Ansible playbook.
///
/// The playbook runs once per reconciliation, no matter how many repositories
/// changed. Its output is passed through to our stdout and stderr, and it is
/// killed if it doesn't finish before the timeout.
#[derive(Clone, Debug)]
pub struct PlaybookAction {
    playbook: String,
    inventory: Option<String>,
    timeout: Duration,
    program: String,
    galaxy: String,
}

impl PlaybookAction {
    /// Create a playbook action with the default Ansible executables.
    pub fn new(playbook: String, inventory: Option<String>, timeout: Duration) -> Self {
        PlaybookAction {
            playbook,
            inventory,
            timeout,
            program: PLAYBOOK_PROGRAM.to_string(),
            galaxy: GALAXY_PROGRAM.to_string(),
        }
    }

    /// Use different executables instead of `ansible-playbook` and `ansible-galaxy`.
    pub fn with_programs(mut self, program: &str, galaxy: &str) -> Self {
        self.program = program.to_string();
        self.galaxy = galaxy.to_string();
        self
    }

    fn check_version(&self, executor: &dyn Executor, program: &str) -> Result<String, ActionError> {
        let invocation = Invocation::new(program, ["--version"], VERSION_CHECK_TIMEOUT);
        let version = executor
            .run(&invocation)
            .and_then(|result| result.success())
            .map_err(|err| ActionError::ToolUnavailable(program.to_string(), err))?;

        Ok(version.lines().next().unwrap_or_default().to_string())
    }

    /// Check that both the playbook runner and galaxy are installed and working.
    pub fn check_tools(&self, executor: &dyn Executor) -> Result<(), ActionError> {
        let version = self.check_version(executor, &self.program)?;
        debug!("Found {version}.");
        let version = self.check_version(executor, &self.galaxy)?;
        debug!("Found {version}.");

        Ok(())
    }

    /// The command applying the playbook for the changed repositories.
    pub fn invocation(&self, changed: &[String]) -> Invocation {
        let mut args = vec![self.playbook.clone()];
        if let Some(inventory) = &self.inventory {
            args.push(String::from("-i"));
            args.push(inventory.clone());
        }

        Invocation::new(&self.program, args, self.timeout)
            .env("CI", "true")
            .env("GITOPS_CHANGED_REPOSITORIES", &changed.join(","))
            .inherit_output()
    }

    /// Run the playbook and wait until it finishes.
    pub fn run(&self, executor: &dyn Executor, changed: &[String]) -> Result<(), ActionError> {
        let invocation = self.invocation(changed);
        info!("Running {invocation}.");

        let result = executor
            .run(&invocation)
            .map_err(ActionError::FailedAction)?;
        let elapsed = result.elapsed;
        result.success().map_err(ActionError::FailedAction)?;
        debug!("Playbook finished in {elapsed:?}.");

        Ok(())
    }
}
