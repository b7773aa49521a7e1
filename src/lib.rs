//! Watch local git repositories, keep them in sync with the remote and run an
//! Ansible playbook when any of them changes.
//!
//! ## How it works
//!
//! `gitops-watch` is built up from **triggers**, a **reconciler** and **actions**.
//! Triggers are long running background processes that initiate checks
//! (for example periodic triggers, or HTTP triggers). The reconciler pulls every
//! repository and compares its revision with the last known one. If any of them
//! changed, the playbook runs once for all of them.
//!
//! ```ignore
//! +---------+       +------------+       +----------+
//! | trigger | ----> | reconciler | ----> | playbook |
//! +---------+       +------------+       +----------+
//! ```
//!
//! Every external command runs through an [executor::Executor] with a hard timeout.

/// An action runs if any changes occured (e.g. [applying a playbook](actions::playbook::PlaybookAction)).
pub mod actions;
/// The validated configuration of the watcher.
pub mod config;
/// Runs external commands with a timeout.
pub mod executor;
/// One round of checking every repository and applying the changes.
pub mod reconcile;
/// Tracks the last known revision of the watched repositories.
pub mod repository;
/// The cancellation token shared by the triggers and the main loop.
pub mod shutdown;
/// The main program loop, that runs the triggers and the reconciliation until the shutdown.
pub mod start;
/// A trigger is a long running background process, which initiates the checks
/// (e.g. [on a schedule](triggers::schedule::ScheduleTrigger), [on HTTP request](triggers::http::HttpTrigger)
/// or [once](triggers::once::OnceTrigger)).
pub mod triggers;
