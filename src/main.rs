use args::{parse_args, Args};
use gitops_watch::{
    actions::{playbook::PlaybookAction, ActionError},
    config::{parse_repositories, Config, ConfigError},
    executor::process::ProcessExecutor,
    reconcile::Reconciler,
    repository::{git::configure_credentials, RepositoryError, RepositoryTracker},
    shutdown::Shutdown,
    start::{start, StartError},
    triggers::{
        http::HttpTrigger, once::OnceTrigger, schedule::ScheduleTrigger, signal::SignalTrigger,
        Trigger,
    },
};
use log::{error, info};
use logger::init_logger;
use std::{process, time::Duration};
use thiserror::Error;

mod args;
mod logger;

/// How long the in-flight work gets to observe the shutdown.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum MainError {
    #[error("Configuration error: {0}.")]
    InvalidConfig(#[from] ConfigError),
    #[error("Ansible not available: {0}.")]
    MissingTools(#[from] ActionError),
    #[error("Git configuration error: {0}.")]
    FailedGitConfig(#[from] RepositoryError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("Cannot initialize logger: {0}.")]
    FailedLogger(#[from] log::SetLoggerError),
    #[error("Cannot determine the local timezone for the logger.")]
    FailedLoggerTimezones,
}

fn load_config(args: Args) -> Config {
    let mut config = Config {
        playbook: args.playbook.unwrap_or_default(),
        inventory: args.inventory,
        interval: Duration::from_secs(args.interval),
        repositories: args
            .repos
            .as_deref()
            .map(parse_repositories)
            .unwrap_or_default(),
        branch: args.branch,
        github_token: args.github_token.unwrap_or_default(),
        github_user: args.github_user.unwrap_or_default(),
        git_timeout: args.git_timeout.into(),
        playbook_timeout: args.playbook_timeout.into(),
    };
    config.apply_env(|key| std::env::var(key).ok());

    config
}

fn main_inner(args: Args) -> Result<(), MainError> {
    let once = args.once;
    let http = args.http.clone();
    let config = load_config(args);
    info!("Starting Ansible GitOps watcher...");
    info!("Configuration: {config:?}.");
    config.validate()?;

    let executor = ProcessExecutor::new();

    // Setup action and check the tools before starting.
    let playbook = PlaybookAction::new(
        config.playbook.clone(),
        config.inventory.clone(),
        config.playbook_timeout,
    );
    playbook.check_tools(&executor)?;

    configure_credentials(
        &executor,
        &config.github_user,
        &config.github_token,
        config.git_timeout,
    )?;

    // Setup the reconciler with the initial revisions.
    let tracker = RepositoryTracker::initialize(
        &executor,
        &config.repositories,
        &config.branch,
        config.git_timeout,
    );
    let mut reconciler = Reconciler::new(Box::new(executor), tracker, playbook);

    // Setup triggers.
    let mut triggers: Vec<Box<dyn Trigger>> = vec![Box::new(SignalTrigger::new())];
    if once {
        triggers.push(Box::new(OnceTrigger));
    } else {
        triggers.push(Box::new(ScheduleTrigger::new(config.interval)));
        if let Some(http) = http {
            triggers.push(Box::new(HttpTrigger::new(http)));
        }
    }

    let shutdown = Shutdown::new();
    start(triggers, &mut reconciler, &shutdown, SHUTDOWN_GRACE_PERIOD)?;
    info!("Service stopped.");

    Ok(())
}

fn main() {
    let args = parse_args();
    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(err) = init_logger(&args) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Err(err) = main_inner(args) {
        error!("{err}");
        process::exit(1);
    }
}
