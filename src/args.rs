use duration_string::DurationString;
use gumdrop::Options;

/// Watch git repositories and run an Ansible playbook when they change.
///
/// Every option can also be set with environment variables, which take precedence.
#[derive(Debug, Options)]
pub struct Args {
    /// The playbook to run on changes (env: ANSIBLE_PLAYBOOK).
    #[options(short = "p")]
    pub playbook: Option<String>,

    /// The inventory to run the playbook on (env: ANSIBLE_INVENTORY).
    #[options(short = "i")]
    pub inventory: Option<String>,

    /// Check the repositories with this interval in seconds, at least 10 (env: WATCH_INTERVAL).
    #[options(no_short, default = "300")]
    pub interval: u64,

    /// Comma-separated list of repositories to watch (env: WATCH_REPOS).
    #[options(short = "r")]
    pub repos: Option<String>,

    /// The branch to watch for changes (env: WATCH_BRANCH).
    #[options(short = "b", default = "main")]
    pub branch: String,

    /// GitHub personal access token to pull with (env: GITHUB_TOKEN).
    #[options(no_short)]
    pub github_token: Option<String>,

    /// GitHub username (env: GITHUB_USER).
    #[options(no_short)]
    pub github_user: Option<String>,

    /// Kill git commands after this long.
    ///
    /// Can be a number postfixed with s(econd), m(inutes), h(ours), d(ays)
    #[options(no_short, default = "2m")]
    pub git_timeout: DurationString,

    /// Kill the playbook after this long.
    ///
    /// Can be a number postfixed with s(econd), m(inutes), h(ours), d(ays)
    #[options(no_short, default = "30m")]
    pub playbook_timeout: DurationString,

    /// Check the repositories only once. Useful for cronjobs.
    #[options(no_short)]
    pub once: bool,

    /// Runs an HTTP server on the address, which allows to trigger a check by calling it.
    #[options(no_short)]
    pub http: Option<String>,

    /// Increase verbosity, can be set multiple times (-v debug, -vv tracing)
    #[options(count)]
    pub verbose: u8,

    /// Only print errors.
    #[options(short = "q")]
    pub quiet: bool,

    /// Print the current version.
    #[options(short = "V")]
    pub version: bool,

    /// Print this help.
    #[options()]
    pub help: bool,
}

pub fn parse_args() -> Args {
    Args::parse_args_default_or_exit()
}
