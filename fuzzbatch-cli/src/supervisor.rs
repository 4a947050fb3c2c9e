//! Run Supervisor
//!
//! Launches one fuzzer instance against its output directory and holds it to
//! a wall-clock budget.
//!
//! ## Kill policies
//!
//! - **Process group** ([`KillPolicy::ProcessGroup`]): the fuzzer is spawned
//!   directly as the leader of a fresh process group. The supervisor polls for
//!   exit; on deadline it sends SIGTERM to the whole group, waits out the grace
//!   period, then SIGKILLs the group. After a normal exit the group is swept
//!   once more so helpers the fuzzer forked do not outlive the run.
//!
//! - **Timeout wrapper** ([`KillPolicy::TimeoutWrapper`]): the command is
//!   prefixed with `timeout <secs>` and spawned without an intermediate shell.
//!   The wrapper only signals its own process group and sends SIGTERM once,
//!   so descendants that call `setsid` or ignore SIGTERM can keep running
//!   after the budget. This is a known resource leak of this policy.
//!
//! Detached launches always use the wrapper: nothing on the supervisor side
//! outlives the call to enforce a deadline.

use crate::config::KillPolicy;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Exit code of GNU `timeout` when it had to terminate the command
pub const WRAPPER_TIMEOUT_EXIT_CODE: i32 = 124;

/// Errors from launching or bounding a run
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Command or timeout unusable
    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    /// The process could not be started
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Executable that failed to start
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Polling or reaping the run failed
    #[error("Failed waiting for run in {}: {source}", dir.display())]
    Wait {
        /// Output directory of the run
        dir: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The run's process group could not be signalled
    #[error("Failed to signal process group {pgid}: {source}")]
    Signal {
        /// Process group id
        pgid: i32,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// One fuzzer run: what to launch, where it writes, and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    output_directory: PathBuf,
    timeout_secs: u64,
    command: Vec<String>,
}

impl RunRequest {
    /// Create a request. The first command token is the fuzzer executable.
    pub fn new(
        command: Vec<String>,
        timeout_secs: u64,
        output_directory: impl Into<PathBuf>,
    ) -> Result<Self, SupervisorError> {
        if command.is_empty() {
            return Err(SupervisorError::InvalidRequest(
                "empty fuzzer command".to_string(),
            ));
        }
        if timeout_secs == 0 {
            return Err(SupervisorError::InvalidRequest(
                "timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(Self {
            output_directory: output_directory.into(),
            timeout_secs,
            command,
        })
    }

    /// Create a request from a space-delimited command line
    pub fn from_command_line(
        command_line: &str,
        timeout_secs: u64,
        output_directory: impl Into<PathBuf>,
    ) -> Result<Self, SupervisorError> {
        Self::new(
            split_command_line(command_line),
            timeout_secs,
            output_directory,
        )
    }

    /// Directory the run writes into
    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Budget in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Budget as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fuzzer command tokens, executable first
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Fuzzer argv with `<output_flag> <output_directory>` right after the executable
    pub fn fuzzer_argv(&self, output_flag: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.command.len() + 2);
        argv.push(self.command[0].clone());
        argv.push(output_flag.to_string());
        argv.push(self.output_directory.to_string_lossy().into_owned());
        argv.extend(self.command[1..].iter().cloned());
        argv
    }

    /// `<wrapper> <secs> <fuzzer argv...>`
    pub fn wrapped_argv(&self, wrapper_program: &str, output_flag: &str) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.command.len() + 4);
        argv.push(wrapper_program.to_string());
        argv.push(self.timeout_secs.to_string());
        argv.extend(self.fuzzer_argv(output_flag));
        argv
    }
}

/// Split a command line on whitespace. No quoting rules apply.
pub fn split_command_line(command_line: &str) -> Vec<String> {
    command_line.split_whitespace().map(str::to_string).collect()
}

/// How a supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The fuzzer exited on its own (`code` is `None` when killed by a signal)
    Exited { code: Option<i32> },
    /// The run was terminated for exceeding its budget
    TimedOut,
}

impl RunStatus {
    /// Interpret the exit status of a wrapped run
    pub fn from_wrapper_exit(status: ExitStatus) -> Self {
        match status.code() {
            Some(WRAPPER_TIMEOUT_EXIT_CODE) => RunStatus::TimedOut,
            code => RunStatus::Exited { code },
        }
    }

    /// Whether the run hit its budget
    pub fn timed_out(self) -> bool {
        matches!(self, RunStatus::TimedOut)
    }
}

/// Handle to a detached run
///
/// The caller may wait on it or simply drop it. Dropping neither kills the
/// run nor reaps it: the exit status is lost, and there is no way left to
/// tell when the output directory holds final stats.
#[derive(Debug)]
pub struct RunHandle {
    child: Child,
    output_directory: PathBuf,
}

impl RunHandle {
    /// OS process id of the wrapper
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Directory the run writes into
    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Non-blocking status check
    pub fn try_status(&mut self) -> Result<Option<RunStatus>, SupervisorError> {
        self.child
            .try_wait()
            .map(|status| status.map(RunStatus::from_wrapper_exit))
            .map_err(|source| SupervisorError::Wait {
                dir: self.output_directory.clone(),
                source,
            })
    }

    /// Block until the run exits or its wrapper times it out
    pub fn wait(mut self) -> Result<RunStatus, SupervisorError> {
        self.child
            .wait()
            .map(RunStatus::from_wrapper_exit)
            .map_err(|source| SupervisorError::Wait {
                dir: self.output_directory,
                source,
            })
    }
}

/// Result of [`RunSupervisor::launch`]
#[derive(Debug)]
pub enum RunLaunch {
    /// Started without waiting
    Detached(RunHandle),
    /// Waited for completion
    Finished(RunStatus),
}

/// Supervisor settings
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Kill strategy for blocking runs
    pub kill_policy: KillPolicy,
    /// Time-bounding utility for the wrapper policy
    pub wrapper_program: String,
    /// Flag injected before the output directory
    pub output_flag: String,
    /// Delay between SIGTERM and SIGKILL (process-group policy)
    pub grace_period: Duration,
    /// How often a blocking run is checked for exit
    pub poll_interval: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            kill_policy: KillPolicy::default(),
            wrapper_program: "timeout".to_string(),
            output_flag: "-o".to_string(),
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Launches and bounds fuzzer runs
#[derive(Debug, Clone, Default)]
pub struct RunSupervisor {
    settings: SupervisorSettings,
}

impl RunSupervisor {
    /// Create a supervisor with the given settings
    pub fn new(settings: SupervisorSettings) -> Self {
        Self { settings }
    }

    /// Active settings
    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Launch a run, blocking until it ends when `wait` is set
    pub fn launch(&self, request: &RunRequest, wait: bool) -> Result<RunLaunch, SupervisorError> {
        if wait {
            self.run_to_completion(request).map(RunLaunch::Finished)
        } else {
            self.spawn_detached(request).map(RunLaunch::Detached)
        }
    }

    /// Start a wrapped run with its output discarded and return at once
    pub fn spawn_detached(&self, request: &RunRequest) -> Result<RunHandle, SupervisorError> {
        if self.settings.kill_policy == KillPolicy::ProcessGroup {
            debug!(
                "detached run in {} is bounded by {}",
                request.output_directory().display(),
                self.settings.wrapper_program
            );
        }

        let argv = request.wrapped_argv(&self.settings.wrapper_program, &self.settings.output_flag);
        info!("Command: {}", argv.join(" "));

        let mut command = build_command(&argv);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = spawn(&mut command, &argv[0])?;
        Ok(RunHandle {
            child,
            output_directory: request.output_directory().to_path_buf(),
        })
    }

    /// Run to completion or timeout under the configured kill policy
    pub fn run_to_completion(&self, request: &RunRequest) -> Result<RunStatus, SupervisorError> {
        match self.settings.kill_policy {
            KillPolicy::TimeoutWrapper => self.run_wrapped(request),
            KillPolicy::ProcessGroup => self.run_in_process_group(request),
        }
    }

    fn run_wrapped(&self, request: &RunRequest) -> Result<RunStatus, SupervisorError> {
        let argv = request.wrapped_argv(&self.settings.wrapper_program, &self.settings.output_flag);
        info!("Command: {}", argv.join(" "));

        let mut command = build_command(&argv);
        command.stdin(Stdio::null());

        let mut child = spawn(&mut command, &argv[0])?;
        let status = child.wait().map_err(|source| SupervisorError::Wait {
            dir: request.output_directory().to_path_buf(),
            source,
        })?;
        Ok(RunStatus::from_wrapper_exit(status))
    }

    fn run_in_process_group(&self, request: &RunRequest) -> Result<RunStatus, SupervisorError> {
        use std::os::unix::process::CommandExt;

        let deadline = Instant::now()
            .checked_add(request.timeout())
            .ok_or_else(|| {
                SupervisorError::InvalidRequest(format!(
                    "timeout of {}s is out of range",
                    request.timeout_secs()
                ))
            })?;

        let argv = request.fuzzer_argv(&self.settings.output_flag);
        info!(
            "Command: {} (timeout {}s, process-group kill)",
            argv.join(" "),
            request.timeout_secs()
        );

        let mut command = build_command(&argv);
        command.stdin(Stdio::null()).process_group(0);

        let mut child = spawn(&mut command, &argv[0])?;
        let pgid = child.id() as libc::pid_t;

        loop {
            match leader_exited(pgid) {
                Ok(true) => {
                    // Sweep before reaping: the zombie leader pins the group id.
                    self.sweep_group(pgid, request.output_directory());
                    let status = child.wait().map_err(|source| SupervisorError::Wait {
                        dir: request.output_directory().to_path_buf(),
                        source,
                    })?;
                    return Ok(RunStatus::Exited {
                        code: status.code(),
                    });
                }
                Ok(false) => {}
                Err(source) => {
                    let _ = signal_group(pgid, libc::SIGKILL);
                    let _ = child.wait();
                    return Err(SupervisorError::Wait {
                        dir: request.output_directory().to_path_buf(),
                        source,
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.handle_timeout(&mut child, pgid, request.output_directory());
            }
            std::thread::sleep(remaining.min(self.settings.poll_interval));
        }
    }

    /// SIGTERM the group, wait out the grace period, then SIGKILL it
    fn handle_timeout(
        &self,
        child: &mut Child,
        pgid: libc::pid_t,
        dir: &Path,
    ) -> Result<RunStatus, SupervisorError> {
        debug!(
            "run in {} reached its deadline, sending SIGTERM to group {}",
            dir.display(),
            pgid
        );
        match signal_group(pgid, libc::SIGTERM) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SupervisorError::Signal { pgid, source });
            }
        }

        let grace_deadline = Instant::now() + self.settings.grace_period;
        loop {
            match leader_exited(pgid) {
                Ok(false) => {}
                Ok(true) | Err(_) => break,
            }
            let remaining = grace_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("group {} outlived the grace period, sending SIGKILL", pgid);
                break;
            }
            std::thread::sleep(remaining.min(self.settings.poll_interval));
        }

        // The leader is not reaped yet, so the group id still names this run.
        let _ = signal_group(pgid, libc::SIGKILL);
        child.wait().map_err(|source| SupervisorError::Wait {
            dir: dir.to_path_buf(),
            source,
        })?;
        Ok(RunStatus::TimedOut)
    }

    /// SIGKILL whatever the fuzzer left behind in its group
    fn sweep_group(&self, pgid: libc::pid_t, dir: &Path) {
        match signal_group(pgid, libc::SIGKILL) {
            Ok(()) => debug!("swept group {} of the run in {}", pgid, dir.display()),
            Err(e) => warn!(
                "could not sweep group {} of the run in {}: {}",
                pgid,
                dir.display(),
                e
            ),
        }
    }
}

fn build_command(argv: &[String]) -> Command {
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);
    command
}

fn spawn(command: &mut Command, program: &str) -> Result<Child, SupervisorError> {
    command.spawn().map_err(|source| SupervisorError::SpawnFailed {
        program: program.to_string(),
        source,
    })
}

/// Whether a child has exited, leaving it unreaped
///
/// While the child is an unreaped zombie its pid cannot be reused, so a
/// group it leads can still be signalled safely.
fn leader_exited(pid: libc::pid_t) -> Result<bool, std::io::Error> {
    // SAFETY: siginfo_t is plain old data; all zeroes is a valid value.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    // SAFETY: `info` outlives the call and is only written by the kernel.
    let ret = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if ret == -1 {
        return Err(std::io::Error::last_os_error());
    }
    // si_pid stays zero while the child is still running.
    // SAFETY: `info` is either zeroed or filled in for an exited child.
    Ok(unsafe { info.si_pid() } != 0)
}

/// Send a signal to every process in a group
fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> Result<(), std::io::Error> {
    // SAFETY: killpg takes plain integers and touches no memory of ours.
    let ret = unsafe { libc::killpg(pgid, signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn request(command_line: &str, dir: &str) -> RunRequest {
        RunRequest::from_command_line(command_line, 5, dir).unwrap()
    }

    fn supervisor(kill_policy: KillPolicy) -> RunSupervisor {
        RunSupervisor::new(SupervisorSettings {
            kill_policy,
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        })
    }

    #[test]
    fn test_output_flag_follows_executable() {
        let req = request("fuzzcmd -i in -- target", "./exp/output_1");
        assert_eq!(
            req.fuzzer_argv("-o"),
            vec!["fuzzcmd", "-o", "./exp/output_1", "-i", "in", "--", "target"]
        );
    }

    #[test]
    fn test_wrapped_command_line() {
        let req = request("fuzzcmd -i in -- target", "./exp/output_2");
        assert_eq!(
            req.wrapped_argv("timeout", "-o").join(" "),
            "timeout 5 fuzzcmd -o ./exp/output_2 -i in -- target"
        );
    }

    #[test]
    fn test_single_token_command() {
        let req = request("  fuzzcmd  ", "out");
        assert_eq!(req.command(), ["fuzzcmd"]);
        assert_eq!(req.fuzzer_argv("-o"), vec!["fuzzcmd", "-o", "out"]);
    }

    #[test]
    fn test_invalid_requests() {
        assert!(matches!(
            RunRequest::from_command_line("   ", 5, "out"),
            Err(SupervisorError::InvalidRequest(_))
        ));
        assert!(matches!(
            RunRequest::from_command_line("fuzzcmd", 0, "out"),
            Err(SupervisorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_wrapper_exit_code_mapping() {
        let timed_out = ExitStatus::from_raw(WRAPPER_TIMEOUT_EXIT_CODE << 8);
        assert_eq!(RunStatus::from_wrapper_exit(timed_out), RunStatus::TimedOut);

        let clean = ExitStatus::from_raw(0);
        assert_eq!(
            RunStatus::from_wrapper_exit(clean),
            RunStatus::Exited { code: Some(0) }
        );

        let killed = ExitStatus::from_raw(libc::SIGKILL);
        assert_eq!(
            RunStatus::from_wrapper_exit(killed),
            RunStatus::Exited { code: None }
        );
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let req = request("/nonexistent/fuzzbatch-fuzzer -i in", "out");
        let err = supervisor(KillPolicy::ProcessGroup)
            .run_to_completion(&req)
            .unwrap_err();
        assert!(matches!(err, SupervisorError::SpawnFailed { ref program, .. } if program == "/nonexistent/fuzzbatch-fuzzer"));
    }

    #[test]
    fn test_process_group_exit_code() {
        let sup = supervisor(KillPolicy::ProcessGroup);
        assert_eq!(
            sup.run_to_completion(&request("true", "out")).unwrap(),
            RunStatus::Exited { code: Some(0) }
        );
        assert_eq!(
            sup.run_to_completion(&request("false", "out")).unwrap(),
            RunStatus::Exited { code: Some(1) }
        );
    }

    #[test]
    fn test_unrepresentable_deadline_rejected_before_spawn() {
        let req =
            RunRequest::from_command_line("/nonexistent/fuzzbatch-fuzzer", u64::MAX, "out").unwrap();
        let err = supervisor(KillPolicy::ProcessGroup)
            .run_to_completion(&req)
            .unwrap_err();
        // A spawn attempt would have surfaced as SpawnFailed.
        assert!(matches!(err, SupervisorError::InvalidRequest(_)));
    }

    #[test]
    fn test_exited_leader_still_holds_its_group() {
        use std::os::unix::process::CommandExt;

        let mut child = Command::new("true").process_group(0).spawn().unwrap();
        let pgid = child.id() as libc::pid_t;

        let deadline = Instant::now() + Duration::from_secs(10);
        while !leader_exited(pgid).unwrap() {
            assert!(Instant::now() < deadline, "leader never exited");
            std::thread::sleep(Duration::from_millis(10));
        }

        // Exited but unreaped: the group can still be signalled.
        assert!(signal_group(pgid, 0).is_ok());
        assert!(child.wait().unwrap().success());
        let gone = signal_group(pgid, 0).unwrap_err();
        assert_eq!(gone.raw_os_error(), Some(libc::ESRCH));
    }

    #[test]
    fn test_wrapped_blocking_run() {
        let status = supervisor(KillPolicy::TimeoutWrapper)
            .run_to_completion(&request("true", "out"))
            .unwrap();
        assert_eq!(status, RunStatus::Exited { code: Some(0) });
    }

    #[test]
    fn test_detached_handle_can_be_waited() {
        let launch = supervisor(KillPolicy::ProcessGroup)
            .launch(&request("true", "out"), false)
            .unwrap();
        let RunLaunch::Detached(handle) = launch else {
            panic!("expected a detached run");
        };
        assert_eq!(handle.output_directory(), Path::new("out"));
        assert!(handle.pid() > 0);
        assert_eq!(handle.wait().unwrap(), RunStatus::Exited { code: Some(0) });
    }
}
