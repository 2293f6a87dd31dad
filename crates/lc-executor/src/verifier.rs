// verifier.rs — runs a ChangePlan's verification_plan entries as real
// subprocesses, resolved against the policy's named command_profiles so a
// ChangePlan can never smuggle an arbitrary argv through the pipeline.
//
// Grounded on `ta_submit::git::GitAdapter::git_cmd`'s `Command::new(..).output()`
// idiom, generalized with a polling timeout and an output-size cap since a
// verification command is untrusted in a way a fixed `git` invocation is not.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use lc_changeset::VerificationStep;
use lc_policy::CommandProfile;

use crate::error::ExecutorError;

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub profile_name: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run one command profile to completion or timeout, polling the child's
/// status rather than blocking on `wait()` so a hung process can be killed.
pub(crate) fn run_profile(name: &str, profile: &CommandProfile) -> Result<CommandOutcome, ExecutorError> {
    let Some((program, args)) = profile.argv.split_first() else {
        return Err(ExecutorError::VerifyFailed(format!(
            "command profile `{name}` has an empty argv"
        )));
    };

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecutorError::ApplyFailed {
            path: name.to_string(),
            source,
        })?;

    let cap = profile.output_cap_bytes;
    let stdout_rx = spawn_reader(child.stdout.take(), cap);
    let stderr_rx = spawn_reader(child.stderr.take(), cap);

    let timeout = Duration::from_secs(profile.timeout_secs);
    let start = Instant::now();
    let status = poll_until_exit(&mut child, timeout);

    let stdout = stdout_rx.recv().unwrap_or_default();
    let stderr = stderr_rx.recv().unwrap_or_default();
    let duration = start.elapsed();

    match status {
        Some(status) => Ok(CommandOutcome {
            profile_name: name.to_string(),
            exit_code: status.code(),
            stdout,
            stderr,
            timed_out: false,
            duration,
        }),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(CommandOutcome {
                profile_name: name.to_string(),
                exit_code: None,
                stdout,
                stderr,
                timed_out: true,
                duration,
            })
        }
    }
}

fn poll_until_exit(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    return None;
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return None,
        }
    }
}

fn spawn_reader(
    pipe: Option<impl Read + Send + 'static>,
    cap: usize,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if buf.len() < cap {
                                let remaining = cap - buf.len();
                                buf.extend_from_slice(&chunk[..n.min(remaining)]);
                            }
                        }
                        Err(_) => break,
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// Run every verification step in order, resolving each step's profile_name
/// against `command_profiles`. The first failing or timed-out step stops
/// the run; a missing profile name is itself a verify failure, not a plan
/// error, since the profile catalog can change after a plan was drafted.
pub fn verify(
    steps: &[VerificationStep],
    command_profiles: &std::collections::HashMap<String, CommandProfile>,
) -> Result<Vec<CommandOutcome>, ExecutorError> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        let profile_name = match step {
            VerificationStep::CommandProfile { profile_name } => profile_name,
            VerificationStep::TestRunner { profile_name } => profile_name,
        };
        let Some(profile) = command_profiles.get(profile_name) else {
            return Err(ExecutorError::VerifyFailed(format!(
                "no command profile registered for `{profile_name}`"
            )));
        };
        let outcome = run_profile(profile_name, profile)?;
        if !outcome.succeeded() {
            let reason = if outcome.timed_out {
                format!("`{profile_name}` timed out after {}s", profile.timeout_secs)
            } else {
                format!(
                    "`{profile_name}` exited with {:?}: {}",
                    outcome.exit_code,
                    outcome.stderr.lines().next().unwrap_or("")
                )
            };
            outcomes.push(outcome);
            return Err(ExecutorError::VerifyFailed(reason));
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(argv: &[&str]) -> CommandProfile {
        CommandProfile {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 5,
            output_cap_bytes: 1024,
        }
    }

    #[test]
    fn successful_command_reports_exit_zero() {
        let outcome = run_profile("t", &profile(&["true"])).unwrap();
        assert!(outcome.succeeded());
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn failing_command_is_not_success() {
        let outcome = run_profile("t", &profile(&["false"])).unwrap();
        assert!(!outcome.succeeded());
    }

    #[test]
    fn stdout_is_captured() {
        let outcome = run_profile("t", &profile(&["echo", "hello-world"])).unwrap();
        assert!(outcome.stdout.contains("hello-world"));
    }

    #[test]
    fn timeout_kills_long_running_command() {
        let mut p = profile(&["sleep", "5"]);
        p.timeout_secs = 1;
        let outcome = run_profile("t", &p).unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.succeeded());
    }

    #[test]
    fn verify_stops_at_missing_profile() {
        let steps = vec![VerificationStep::CommandProfile {
            profile_name: "does-not-exist".into(),
        }];
        let profiles = std::collections::HashMap::new();
        let result = verify(&steps, &profiles);
        assert!(matches!(result, Err(ExecutorError::VerifyFailed(_))));
    }

    #[test]
    fn verify_runs_registered_profile() {
        let steps = vec![VerificationStep::TestRunner {
            profile_name: "ok".into(),
        }];
        let mut profiles = std::collections::HashMap::new();
        profiles.insert("ok".to_string(), profile(&["true"]));
        let outcomes = verify(&steps, &profiles).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].succeeded());
    }
}
