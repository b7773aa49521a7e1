use std::{fmt, path::Path, time::Duration};
use thiserror::Error;

/// The shortest allowed interval between two checks.
pub const MINIMUM_INTERVAL: Duration = Duration::from_secs(10);
/// The shortest credential token we accept.
pub const MINIMUM_TOKEN_LENGTH: usize = 40;

/// A custom error describing why a configuration is invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("playbook path is required")]
    MissingPlaybook,
    #[error("playbook file does not exist: {0}")]
    PlaybookNotFound(String),
    #[error("inventory file does not exist: {0}")]
    InventoryNotFound(String),
    #[error("watch interval must be at least {} seconds", MINIMUM_INTERVAL.as_secs())]
    IntervalTooShort,
    #[error("at least one repository must be specified")]
    NoRepositories,
    #[error("GitHub token is required")]
    MissingToken,
    #[error("invalid GitHub token format")]
    InvalidToken,
}

/// Everything needed to watch the repositories and run the playbook.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub playbook: String,
    pub inventory: Option<String>,
    pub interval: Duration,
    pub repositories: Vec<String>,
    pub branch: String,
    pub github_token: String,
    pub github_user: String,
    pub git_timeout: Duration,
    pub playbook_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            playbook: String::new(),
            inventory: None,
            interval: Duration::from_secs(300),
            repositories: vec![],
            branch: String::from("main"),
            github_token: String::new(),
            github_user: String::new(),
            git_timeout: Duration::from_secs(120),
            playbook_timeout: Duration::from_secs(30 * 60),
        }
    }
}

// Keep the token out of the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("playbook", &self.playbook)
            .field("inventory", &self.inventory)
            .field("interval", &self.interval)
            .field("repositories", &self.repositories)
            .field("branch", &self.branch)
            .field("github_token", &"<redacted>")
            .field("github_user", &self.github_user)
            .field("git_timeout", &self.git_timeout)
            .field("playbook_timeout", &self.playbook_timeout)
            .finish()
    }
}

/// Split a comma separated list of repositories, dropping the empty entries.
pub fn parse_repositories(repositories: &str) -> Vec<String> {
    repositories
        .split(',')
        .map(str::trim)
        .filter(|repository| !repository.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Overwrite the values with the environment variables that are set.
    ///
    /// The lookup is passed in, so it can be tested without touching the process environment.
    /// An interval that is not a number of seconds is ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(playbook) = lookup("ANSIBLE_PLAYBOOK") {
            self.playbook = playbook;
        }
        if let Some(inventory) = lookup("ANSIBLE_INVENTORY") {
            self.inventory = Some(inventory);
        }
        if let Some(interval) = lookup("WATCH_INTERVAL").and_then(|i| i.trim().parse().ok()) {
            self.interval = Duration::from_secs(interval);
        }
        if let Some(repositories) = lookup("WATCH_REPOS") {
            self.repositories = parse_repositories(&repositories);
        }
        if let Some(branch) = lookup("WATCH_BRANCH") {
            self.branch = branch;
        }
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github_token = token;
        }
        if let Some(user) = lookup("GITHUB_USER") {
            self.github_user = user;
        }
    }

    /// Check the configuration before starting, the first problem is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playbook.is_empty() {
            return Err(ConfigError::MissingPlaybook);
        }
        if !Path::new(&self.playbook).exists() {
            return Err(ConfigError::PlaybookNotFound(self.playbook.clone()));
        }
        if let Some(inventory) = &self.inventory {
            if !Path::new(inventory).exists() {
                return Err(ConfigError::InventoryNotFound(inventory.clone()));
            }
        }
        if self.interval < MINIMUM_INTERVAL {
            return Err(ConfigError::IntervalTooShort);
        }
        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }
        if self.github_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.github_token.chars().count() < MINIMUM_TOKEN_LENGTH {
            return Err(ConfigError::InvalidToken);
        }

        Ok(())
    }
}
