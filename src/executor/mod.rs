use mockall::automock;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

/// An executor backed by real operating system processes.
pub mod process;

/// What to do with the output of the command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture stdout and stderr together, to be inspected by the caller.
    Capture,
    /// Pass stdout and stderr through to our own streams.
    Inherit,
}

/// A single external command to run, with a hard deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub directory: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    pub timeout: Duration,
    pub output: OutputMode,
    /// The arguments contain secrets and must not be printed.
    pub sensitive: bool,
}

impl Invocation {
    /// Create an invocation that captures its output.
    pub fn new<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            directory: None,
            envs: vec![],
            timeout,
            output: OutputMode::Capture,
            sensitive: false,
        }
    }

    pub fn dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.output = OutputMode::Inherit;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            return write!(f, "{} <redacted>", self.program);
        }

        let words =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(line) => write!(f, "{line}"),
            Err(_) => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// The outcome of a finished or killed process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The exit code, `None` if the process was killed by a signal or timed out.
    pub code: Option<i32>,
    /// The combined stdout and stderr, empty if the output was inherited.
    pub output: String,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Returns the trimmed output if the process exited successfully,
    /// otherwise the reason of the failure.
    pub fn success(self) -> Result<String, ExecutorError> {
        if self.timed_out {
            return Err(ExecutorError::TimedOut(self.elapsed));
        }

        match self.code {
            Some(0) => Ok(self.output),
            Some(code) => Err(ExecutorError::NonZeroExitcode(code, self.output)),
            None => Err(ExecutorError::Terminated(self.output)),
        }
    }
}

/// A custom error describing the error cases of running a command.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The process could not be started, usually because the program doesn't exist.
    #[error("cannot start {0}: {1}")]
    StartFailed(String, #[source] std::io::Error),
    /// Waiting on or killing the process failed.
    #[error("cannot wait for the process: {0}")]
    WaitFailed(#[source] std::io::Error),
    /// The temporary file holding the output could not be created or read.
    #[error("cannot capture the output: {0}")]
    CaptureFailed(#[source] std::io::Error),
    /// The process returned a non-zero exit code. The parameters are the exit code and the output.
    #[error("returned non-zero exit code {0} with message: {1}")]
    NonZeroExitcode(i32, String),
    /// The process was terminated by a signal.
    #[error("was terminated by a signal with message: {0}")]
    Terminated(String),
    /// The process did not finish in time and was killed.
    #[error("timed out after {0:?} and was killed")]
    TimedOut(Duration),
    /// The output contains non-UTF8 characters.
    #[error("returned invalid characters")]
    NonUtf8Return,
}

/// Runs external commands synchronously with a hard timeout.
///
/// Everything that talks to git or the automation tool goes through this,
/// so it can be substituted with [MockExecutor] in tests.
#[automock]
pub trait Executor {
    /// Run the command and wait until it finishes or its timeout elapses.
    ///
    /// Returns an error only if the process could not be started or waited on,
    /// a failing or timed out process is reported in the [ExecutionResult].
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(code: Option<i32>, timed_out: bool) -> ExecutionResult {
        ExecutionResult {
            code,
            output: String::from("output"),
            elapsed: Duration::from_millis(10),
            timed_out,
        }
    }

    #[test]
    fn it_should_display_the_quoted_command() {
        let invocation = Invocation::new("git", ["-C", "/my repo", "pull"], Duration::from_secs(1));

        let line = invocation.to_string();
        assert!(line.starts_with("git -C "), "{line} should start with the program");
        assert!(!line.contains(" /my repo "), "{line} should quote the path");
        assert!(line.ends_with(" pull"), "{line} should end with the subcommand");
    }

    #[test]
    fn it_should_not_display_sensitive_arguments() {
        let invocation =
            Invocation::new("git", ["config", "secret"], Duration::from_secs(1)).sensitive();

        assert_eq!("git <redacted>", invocation.to_string());
    }

    #[test]
    fn it_should_return_output_on_success() {
        assert_eq!("output", result(Some(0), false).success().unwrap());
    }

    #[test]
    fn it_should_fail_on_non_zero_exit_code() {
        let error = result(Some(2), false).success().err().unwrap();

        assert!(
            matches!(error, ExecutorError::NonZeroExitcode(2, _)),
            "{error:?} should be NonZeroExitcode"
        );
    }

    #[test]
    fn it_should_distinguish_timeouts_from_exit_codes() {
        let error = result(None, true).success().err().unwrap();

        assert!(
            matches!(error, ExecutorError::TimedOut(_)),
            "{error:?} should be TimedOut"
        );
    }

    #[test]
    fn it_should_fail_if_killed_by_a_signal() {
        let error = result(None, false).success().err().unwrap();

        assert!(
            matches!(error, ExecutorError::Terminated(_)),
            "{error:?} should be Terminated"
        );
    }
}
