//! Spawning and reaping the capture helper.
//!
//! Unix only: termination is a SIGTERM so the helper can flush and exit on
//! its own terms, and signal deaths are reported as `128 + signal`.

use std::ffi::OsStr;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use motiongate_common::error::{MotionError, MotionResult};

/// How long `Drop` waits after SIGTERM before falling back to SIGKILL.
const DROP_GRACE: Duration = Duration::from_millis(500);

/// What to connect one of the helper's standard streams to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Create a pipe; the parent end is available from the `take_*` methods.
    Pipe,
    /// Connect to the null device.
    Null,
}

impl StreamMode {
    fn stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Pipe => Stdio::piped(),
            Self::Null => Stdio::null(),
        }
    }
}

/// Stream wiring for a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelperPipes {
    pub stdin: StreamMode,
    pub stdout: StreamMode,
    pub stderr: StreamMode,
}

impl HelperPipes {
    /// The usual frame-producer wiring: stdout piped to us, no stdin,
    /// stderr shown or discarded.
    pub fn frame_source(show_stderr: bool) -> Self {
        Self {
            stdin: StreamMode::Null,
            stdout: StreamMode::Pipe,
            stderr: if show_stderr {
                StreamMode::Inherit
            } else {
                StreamMode::Null
            },
        }
    }
}

/// A running (or finished) helper process and the parent ends of its pipes.
#[derive(Debug)]
pub struct HelperProcess {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit_code: Option<i32>,
    reaped: Arc<Mutex<bool>>,
}

impl HelperProcess {
    /// Start `argv[0]` with arguments `argv[1..]`, searched on `PATH`.
    pub fn spawn<S: AsRef<OsStr>>(argv: &[S], pipes: HelperPipes) -> MotionResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MotionError::process("helper command is empty"))?;
        let program_name = program.as_ref().to_string_lossy().into_owned();

        let mut child = Command::new(program)
            .args(args)
            .stdin(pipes.stdin.stdio())
            .stdout(pipes.stdout.stdio())
            .stderr(pipes.stderr.stdio())
            .spawn()
            .map_err(|e| MotionError::process(format!("Failed to start {program_name}: {e}")))?;

        tracing::info!(
            pid = child.id(),
            program = %program_name,
            args = args.len(),
            "Helper process started"
        );

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        Ok(Self {
            program: program_name,
            child,
            stdin,
            stdout,
            stderr,
            exit_code: None,
            reaped: Arc::new(Mutex::new(false)),
        })
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Move the parent end of the helper's stdout out, if it was piped.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Move the parent end of the helper's stdin out, if it was piped.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Move the parent end of the helper's stderr out, if it was piped.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// A handle that can terminate the helper from another thread.
    pub fn terminator(&self) -> Terminator {
        Terminator {
            pid: self.child.id(),
            reaped: Arc::clone(&self.reaped),
        }
    }

    /// Ask the helper to exit with SIGTERM. Does nothing once it has been reaped.
    pub fn terminate(&self) {
        self.terminator().terminate();
    }

    /// Whether the helper is still running. Reaps it if it has exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// Exit code if the helper has already exited, without blocking.
    pub fn try_wait(&mut self) -> MotionResult<Option<i32>> {
        if let Some(code) = self.exit_code {
            return Ok(Some(code));
        }
        let mut reaped = lock(&self.reaped);
        match self.child.try_wait()? {
            Some(status) => {
                *reaped = true;
                drop(reaped);
                Ok(Some(self.record_exit(status)))
            }
            None => Ok(None),
        }
    }

    /// Block until the helper exits.
    ///
    /// Returns the exit code, `128 + signal` if a signal killed it, or -1.
    /// Our end of its stdin is closed first so a helper reading it can finish.
    pub fn wait(&mut self) -> MotionResult<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        drop(self.stdin.take());

        // Block without reaping so a concurrent terminate still targets our zombie.
        wait_exited(self.child.id())
            .map_err(|e| MotionError::process(format!("Failed to wait on {}: {e}", self.program)))?;
        let status = self.reap()?;
        Ok(self.record_exit(status))
    }

    /// Close every pipe end still held by this handle.
    pub fn close(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
    }

    /// Collect the exit status of a child known to have exited.
    fn reap(&mut self) -> MotionResult<ExitStatus> {
        let mut reaped = lock(&self.reaped);
        let status = self
            .child
            .wait()
            .map_err(|e| MotionError::process(format!("Failed to reap {}: {e}", self.program)))?;
        *reaped = true;
        Ok(status)
    }

    fn record_exit(&mut self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        self.exit_code = Some(code);
        tracing::info!(pid = self.child.id(), program = %self.program, code, "Helper process exited");
        code
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        self.close();
        if self.exit_code.is_some() {
            return;
        }

        self.terminate();
        let deadline = Instant::now() + DROP_GRACE;
        while Instant::now() < deadline {
            match self.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }

        tracing::warn!(pid = self.child.id(), program = %self.program, "Helper ignored SIGTERM, killing");
        let _ = self.child.kill();
        if let Ok(status) = self.reap() {
            self.record_exit(status);
        }
    }
}

/// Cloneable, `Send` handle that delivers SIGTERM to a helper.
#[derive(Debug, Clone)]
pub struct Terminator {
    pid: u32,
    reaped: Arc<Mutex<bool>>,
}

impl Terminator {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send SIGTERM unless the helper has already been reaped.
    pub fn terminate(&self) {
        let reaped = lock(&self.reaped);
        if *reaped {
            return;
        }
        // SAFETY: kill(2) has no memory-safety preconditions. Reaping takes the
        // same lock, so the pid still names our child (running or zombie) here.
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            tracing::debug!(pid = self.pid, "Sent SIGTERM to helper");
        } else {
            tracing::debug!(
                pid = self.pid,
                error = %std::io::Error::last_os_error(),
                "SIGTERM to helper failed"
            );
        }
    }
}

fn lock(reaped: &Mutex<bool>) -> MutexGuard<'_, bool> {
    reaped.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Block until the child has exited, leaving it waitable.
fn wait_exited(pid: u32) -> io::Result<()> {
    loop {
        // SAFETY: an all-zero siginfo_t is a valid out-parameter for waitid(2).
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a live, writable siginfo_t for the duration of the call.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}
