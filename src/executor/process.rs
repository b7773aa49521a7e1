use super::{ExecutionResult, Executor, ExecutorError, Invocation, OutputMode};
use duct::{cmd, Handle};
use log::trace;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    thread::sleep,
    time::{Duration, Instant},
};

/// How often we look at the process to see if it has finished.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// An executor that starts real processes.
///
/// The process is started in its own process group and polled until it finishes.
/// If it is still running when the timeout elapses, the whole group is killed and
/// the result is marked as timed out.
///
/// Captured output (stdout and stderr together) goes to an anonymous temporary
/// file instead of a pipe, so background processes that inherited the output
/// (e.g. an ssh control master) can't keep us waiting after the command exited.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        ProcessExecutor
    }
}

/// Kill every process in the group of the started command, then reap the command.
fn kill_process_group(handle: &Handle) -> Result<(), ExecutorError> {
    #[cfg(unix)]
    {
        use nix::{
            sys::signal::{killpg, Signal},
            unistd::Pid,
        };
        for pid in handle.pids() {
            // The group might be gone already, that's fine.
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }

    handle.kill().map_err(ExecutorError::WaitFailed)
}

/// Read whatever the command has written so far.
fn read_output(output_file: Option<&mut File>) -> Result<String, ExecutorError> {
    let Some(file) = output_file else {
        return Ok(String::new());
    };

    let mut bytes = vec![];
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut bytes))
        .map_err(ExecutorError::CaptureFailed)?;
    let output_str = std::str::from_utf8(&bytes).map_err(|_| ExecutorError::NonUtf8Return)?;

    Ok(output_str.trim_end().to_string())
}

impl Executor for ProcessExecutor {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, ExecutorError> {
        let mut expression = cmd(invocation.program.as_str(), &invocation.args).unchecked();
        if let Some(directory) = &invocation.directory {
            expression = expression.dir(directory);
        }
        for (key, value) in &invocation.envs {
            expression = expression.env(key, value);
        }

        let mut output_file = match invocation.output {
            OutputMode::Capture => {
                Some(tempfile::tempfile().map_err(ExecutorError::CaptureFailed)?)
            }
            OutputMode::Inherit => None,
        };
        if let Some(file) = &output_file {
            let stdout = file.try_clone().map_err(ExecutorError::CaptureFailed)?;
            expression = expression.stderr_to_stdout().stdout_file(stdout);
        }

        #[cfg(unix)]
        {
            expression = expression.before_spawn(|command| {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
                Ok(())
            });
        }

        trace!("Running {invocation} with timeout {:?}.", invocation.timeout);

        let started = Instant::now();
        let deadline = started + invocation.timeout;
        let handle = expression
            .start()
            .map_err(|err| ExecutorError::StartFailed(invocation.program.clone(), err))?;

        loop {
            // Nothing is captured through pipes, so this never waits on reader threads.
            if let Some(output) = handle.try_wait().map_err(ExecutorError::WaitFailed)? {
                let code = output.status.code();

                return Ok(ExecutionResult {
                    code,
                    output: read_output(output_file.as_mut())?,
                    elapsed: started.elapsed(),
                    timed_out: false,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                trace!("Killing {invocation}, it is running for {:?}.", now - started);
                kill_process_group(&handle)?;

                return Ok(ExecutionResult {
                    code: None,
                    output: read_output(output_file.as_mut())?,
                    elapsed: started.elapsed(),
                    timed_out: true,
                });
            }

            sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
