//! External command execution.
//!
//! Collaborator commands (renderer, synthesizer, validators) are configured
//! as argv templates and may hang, so they run with an optional deadline
//! and an optional cancel handle: the child is polled and killed once the
//! deadline passes or the job is cancelled. Output is drained on helper
//! threads so a chatty child never blocks on a full pipe.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::orchestrator::CancelHandle;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of running a command with a deadline.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The command exited on its own.
    Finished(Output),
    /// The deadline passed and the command was killed.
    TimedOut {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// Cancellation was requested and the command was killed.
    Cancelled,
}

/// Why a running child was killed.
enum Stopped {
    Deadline,
    Cancelled,
}

/// Run `cmd` to completion, killing it after `timeout` or when `cancel`
/// fires.
///
/// Stdin is closed; stdout and stderr are captured.
pub fn run_with_timeout(
    cmd: &mut Command,
    timeout: Option<Duration>,
    cancel: Option<&CancelHandle>,
) -> io::Result<CommandOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!("Running: {}", describe(cmd));

    let mut child = cmd.spawn()?;
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_until_stopped(&mut child, timeout, cancel)?;

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(match status {
        Ok(status) => CommandOutcome::Finished(Output {
            status,
            stdout,
            stderr,
        }),
        Err(Stopped::Deadline) => CommandOutcome::TimedOut { stdout, stderr },
        Err(Stopped::Cancelled) => CommandOutcome::Cancelled,
    })
}

/// Wait for `child`, killing it when the deadline passes or `cancel` fires.
fn wait_until_stopped(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: Option<&CancelHandle>,
) -> io::Result<Result<ExitStatus, Stopped>> {
    if timeout.is_none() && cancel.is_none() {
        return child.wait().map(Ok);
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Ok(status));
        }
        let stopped = if cancel.is_some_and(CancelHandle::is_cancelled) {
            Some(Stopped::Cancelled)
        } else if deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Stopped::Deadline)
        } else {
            None
        };
        if let Some(stopped) = stopped {
            // Kill can race with a natural exit; either way the child is gone
            let _ = child.kill();
            child.wait()?;
            return Ok(Err(stopped));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Expand `{name}` placeholders in an argv template.
///
/// Placeholders are substituted inside each argument, so `--out={output}`
/// works as well as a bare `{output}`.
pub fn expand_args(template: &[String], vars: &[(&str, String)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{}}}", name), value)
            })
        })
        .collect()
}

/// Human-readable command line for logs.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

/// Last non-empty line of a command's stderr (or stdout), for error messages.
pub fn last_output_line(output: &Output) -> String {
    let last_line = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .last()
            .map(|l| l.trim().to_string())
    };
    last_line(&output.stderr)
        .or_else(|| last_line(&output.stdout))
        .unwrap_or_else(|| "no output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_placeholders() {
        let template = vec![
            "tts".to_string(),
            "--in={text_file}".to_string(),
            "{output}".to_string(),
            "{unknown}".to_string(),
        ];
        let args = expand_args(
            &template,
            &[
                ("text_file", "/tmp/a.txt".to_string()),
                ("output", "/tmp/a.mp3".to_string()),
            ],
        );
        assert_eq!(args, vec!["tts", "--in=/tmp/a.txt", "/tmp/a.mp3", "{unknown}"]);
    }

    #[test]
    fn describes_command() {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y").arg("out file.mp3");
        assert_eq!(describe(&cmd), "ffmpeg -y out file.mp3");
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_of_finished_command() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; echo oops >&2; exit 3");
        match run_with_timeout(&mut cmd, Some(Duration::from_secs(10)), None).unwrap() {
            CommandOutcome::Finished(output) => {
                assert_eq!(output.status.code(), Some(3));
                assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
                assert_eq!(last_output_line(&output), "oops");
            }
            other => panic!("command should finish, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn kills_command_after_deadline() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let outcome = run_with_timeout(&mut cmd, Some(Duration::from_millis(100)), None).unwrap();
        assert!(matches!(outcome, CommandOutcome::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn kills_command_when_cancelled() {
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let outcome = run_with_timeout(&mut cmd, None, Some(&cancel)).unwrap();
        canceller.join().unwrap();

        assert!(matches!(outcome, CommandOutcome::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
