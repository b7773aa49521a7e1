use crate::{
    actions::playbook::PlaybookAction, executor::Executor, repository::RepositoryTracker,
    shutdown::Shutdown,
};
use log::{debug, error, info, warn};
use mockall::automock;

/// How a single reconciliation ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tools are unavailable, no repository was checked.
    Skipped,
    /// The shutdown was requested during the scan, the playbook didn't run.
    Cancelled,
    /// No repository changed.
    Unchanged,
    /// These repositories changed and the playbook was applied.
    Applied(Vec<String>),
    /// These repositories changed, but the playbook failed.
    Failed(Vec<String>),
}

/// One round of the watch-and-reconcile loop.
#[automock]
pub trait Reconcile {
    /// Check every repository and apply the changes if there were any.
    fn tick(&mut self, shutdown: &Shutdown) -> TickOutcome;
}

/// Checks the repositories for drift and runs the playbook once if any of them changed.
///
/// It owns the revision state of every repository: it is created once at
/// startup, updated on every tick and dropped at exit.
pub struct Reconciler {
    executor: Box<dyn Executor>,
    tracker: RepositoryTracker,
    playbook: PlaybookAction,
}

impl Reconciler {
    pub fn new(
        executor: Box<dyn Executor>,
        tracker: RepositoryTracker,
        playbook: PlaybookAction,
    ) -> Self {
        Reconciler {
            executor,
            tracker,
            playbook,
        }
    }

    pub fn tracker(&self) -> &RepositoryTracker {
        &self.tracker
    }

    /// Check every repository in order, returning the changed ones or `None`
    /// if the shutdown was requested. A failing repository doesn't stop the others.
    fn scan(&mut self, shutdown: &Shutdown) -> Option<Vec<String>> {
        let branch = self.tracker.branch().to_string();
        let mut changed = vec![];

        for path in self.tracker.paths().to_vec() {
            if shutdown.is_cancelled() {
                debug!("Shutdown requested, stopping the scan before {path}.");
                return None;
            }

            debug!("Checking repository {path} (branch {branch}).");
            match self.tracker.check_and_update(self.executor.as_ref(), &path) {
                Ok(change) if change.changed => {
                    info!(
                        "Detected changes in {path} (branch {branch}): {} -> {}.",
                        change.previous.unwrap_or_default(),
                        change.revision
                    );
                    changed.push(path);
                }
                Ok(_) => {
                    debug!("No changes in {path}.");
                }
                Err(err) => {
                    error!("Checking {path} (branch {branch}) failed: {err}.");
                }
            }
        }

        Some(changed)
    }
}

impl Reconcile for Reconciler {
    fn tick(&mut self, shutdown: &Shutdown) -> TickOutcome {
        debug!("Checking repositories for changes.");

        if let Err(err) = self.playbook.check_tools(self.executor.as_ref()) {
            warn!("Skipping this check, {err}.");
            return TickOutcome::Skipped;
        }

        let Some(changed) = self.scan(shutdown) else {
            return TickOutcome::Cancelled;
        };

        if changed.is_empty() {
            debug!("There are no changes in any repository.");
            return TickOutcome::Unchanged;
        }

        info!("There are changes in {}, running playbook.", changed.join(", "));
        match self.playbook.run(self.executor.as_ref(), &changed) {
            Ok(()) => {
                info!("Playbook finished successfully.");
                TickOutcome::Applied(changed)
            }
            Err(err) => {
                error!("Playbook failed: {err}.");
                TickOutcome::Failed(changed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionResult, Invocation, MockExecutor};
    use log::Level;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn finished(code: i32, output: &str) -> ExecutionResult {
        ExecutionResult {
            code: Some(code),
            output: output.to_string(),
            elapsed: Duration::from_millis(1),
            timed_out: false,
        }
    }

    fn is_version_check(inv: &Invocation) -> bool {
        inv.program.starts_with("ansible-") && inv.args == ["--version"]
    }

    fn is_playbook(inv: &Invocation) -> bool {
        inv.program == "ansible-playbook" && inv.args != ["--version"]
    }

    fn expect_tools(executor: &mut MockExecutor, code: i32) {
        executor
            .expect_run()
            .withf(is_version_check)
            .returning(move |inv| Ok(finished(code, &format!("{} [core 2.16.3]", inv.program))));
    }

    fn expect_playbook(executor: &mut MockExecutor, times: usize, code: i32) {
        executor
            .expect_run()
            .withf(is_playbook)
            .times(times)
            .returning(move |_| Ok(finished(code, "")));
    }

    fn expect_git(
        executor: &mut MockExecutor,
        path: &'static str,
        subcommand: &'static str,
        code: i32,
        output: &'static str,
    ) {
        executor
            .expect_run()
            .withf(move |inv| {
                inv.program == "git" && inv.args[1] == path && inv.args[2] == subcommand
            })
            .returning(move |_| Ok(finished(code, output)));
    }

    fn expect_repository(executor: &mut MockExecutor, path: &'static str, revision: &'static str) {
        expect_git(executor, path, "checkout", 0, "");
        expect_git(executor, path, "pull", 0, "");
        expect_git(executor, path, "rev-parse", 0, revision);
    }

    fn reconciler(executor: MockExecutor, revisions: &[(&str, &str)]) -> Reconciler {
        let paths: Vec<String> = revisions.iter().map(|(p, _)| p.to_string()).collect();
        let mut tracker = RepositoryTracker::new(&paths, "main", TIMEOUT);
        for (path, revision) in revisions {
            tracker.set_revision(path, revision.to_string());
        }
        let playbook = PlaybookAction::new(String::from("site.yml"), None, TIMEOUT);

        Reconciler::new(Box::new(executor), tracker, playbook)
    }

    fn revision(reconciler: &Reconciler, path: &str) -> Option<String> {
        reconciler.tracker().get(path).unwrap().revision.clone()
    }

    #[test]
    fn it_should_run_the_playbook_once_for_a_changed_repository() {
        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_repository(&mut executor, "/a", "111");
        expect_repository(&mut executor, "/b", "333");
        expect_playbook(&mut executor, 1, 0);

        let mut reconciler = reconciler(executor, &[("/a", "111"), ("/b", "222")]);
        let outcome = reconciler.tick(&Shutdown::new());

        assert_eq!(TickOutcome::Applied(vec!["/b".to_string()]), outcome);
        assert_eq!(Some("111".to_string()), revision(&reconciler, "/a"));
        assert_eq!(Some("333".to_string()), revision(&reconciler, "/b"));
    }

    #[test]
    fn it_should_run_the_playbook_once_for_many_changed_repositories() {
        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_repository(&mut executor, "/a", "112");
        expect_repository(&mut executor, "/b", "223");
        expect_repository(&mut executor, "/c", "334");
        expect_playbook(&mut executor, 1, 0);

        let mut reconciler =
            reconciler(executor, &[("/a", "111"), ("/b", "222"), ("/c", "333")]);
        let outcome = reconciler.tick(&Shutdown::new());

        assert_eq!(
            TickOutcome::Applied(vec!["/a".to_string(), "/b".to_string(), "/c".to_string()]),
            outcome
        );
    }

    #[test]
    fn it_should_not_run_the_playbook_without_changes() {
        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_repository(&mut executor, "/a", "111");
        expect_repository(&mut executor, "/b", "222");
        expect_playbook(&mut executor, 0, 0);

        let mut reconciler = reconciler(executor, &[("/a", "111"), ("/b", "222")]);

        assert_eq!(TickOutcome::Unchanged, reconciler.tick(&Shutdown::new()));
        assert_eq!(TickOutcome::Unchanged, reconciler.tick(&Shutdown::new()));
    }

    #[test]
    fn it_should_skip_the_tick_if_the_tools_are_unavailable() {
        testing_logger::setup();

        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 127);
        executor
            .expect_run()
            .withf(|inv| inv.program == "git")
            .times(0);
        expect_playbook(&mut executor, 0, 0);

        let mut reconciler = reconciler(executor, &[("/a", "111")]);
        let outcome = reconciler.tick(&Shutdown::new());

        assert_eq!(TickOutcome::Skipped, outcome);
        assert_eq!(Some("111".to_string()), revision(&reconciler, "/a"));
        testing_logger::validate(|captured_logs| {
            assert!(captured_logs
                .iter()
                .any(|log| log.level == Level::Warn && log.body.starts_with("Skipping this check")));
        });
    }

    #[test]
    fn it_should_continue_with_other_repositories_if_one_fails() {
        testing_logger::setup();

        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_git(&mut executor, "/a", "checkout", 0, "");
        expect_git(&mut executor, "/a", "pull", 1, "fatal: could not read from remote");
        expect_repository(&mut executor, "/b", "333");
        expect_playbook(&mut executor, 1, 0);

        let mut reconciler = reconciler(executor, &[("/a", "111"), ("/b", "222")]);
        let outcome = reconciler.tick(&Shutdown::new());

        assert_eq!(TickOutcome::Applied(vec!["/b".to_string()]), outcome);
        assert_eq!(Some("111".to_string()), revision(&reconciler, "/a"));
        assert_eq!(Some("333".to_string()), revision(&reconciler, "/b"));
        testing_logger::validate(|captured_logs| {
            assert!(captured_logs.iter().any(|log| log.level == Level::Error
                && log.body.contains("/a")
                && log.body.contains("main")
                && log.body.contains("could not read from remote")));
        });
    }

    #[test]
    fn it_should_not_stop_if_the_playbook_fails() {
        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_repository(&mut executor, "/a", "112");
        expect_playbook(&mut executor, 1, 2);

        let mut reconciler = reconciler(executor, &[("/a", "111")]);
        let outcome = reconciler.tick(&Shutdown::new());

        assert_eq!(TickOutcome::Failed(vec!["/a".to_string()]), outcome);
    }

    #[test]
    fn it_should_stop_scanning_on_shutdown() {
        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        executor
            .expect_run()
            .withf(|inv| inv.program == "git")
            .times(0);
        expect_playbook(&mut executor, 0, 0);

        let shutdown = Shutdown::new();
        shutdown.cancel();
        let mut reconciler = reconciler(executor, &[("/a", "111")]);

        assert_eq!(TickOutcome::Cancelled, reconciler.tick(&shutdown));
    }

    #[test]
    fn it_should_stop_scanning_between_repositories_on_shutdown() {
        let shutdown = Shutdown::new();
        let canceller = shutdown.clone();

        let mut executor = MockExecutor::new();
        expect_tools(&mut executor, 0);
        expect_git(&mut executor, "/a", "checkout", 0, "");
        expect_git(&mut executor, "/a", "pull", 0, "");
        // The signal arrives while the first repository is being checked.
        executor
            .expect_run()
            .withf(|inv| {
                inv.program == "git" && inv.args[1] == "/a" && inv.args[2] == "rev-parse"
            })
            .times(1)
            .returning(move |_| {
                canceller.cancel();
                Ok(finished(0, "112"))
            });
        executor
            .expect_run()
            .withf(|inv| inv.program == "git" && inv.args[1] == "/b")
            .times(0);
        expect_playbook(&mut executor, 0, 0);

        let mut reconciler = reconciler(executor, &[("/a", "111"), ("/b", "222")]);

        assert_eq!(TickOutcome::Cancelled, reconciler.tick(&shutdown));
        assert_eq!(Some("112".to_string()), revision(&reconciler, "/a"));
        assert_eq!(Some("222".to_string()), revision(&reconciler, "/b"));
    }
}
