use std::{
    io::Read,
    process::{Child, Command, ExitStatus, Output, Stdio},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use bitflags::bitflags;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::result::CommandError;

pub const YT_DL: &str = "youtube-dl";
pub const YT_DLP: &str = "yt-dlp";
pub const FFMPEG: &str = "ffmpeg";
pub const FFXXX_DEFAULT_ARGS: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

/// How often a running child is checked for completion, deadline and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDIN = 0b0000001;
        const STDOUT = 0b0000010;
        const STDERR = 0b0000100;
    }
}

/// Bounds put on every external program run on behalf of a request.
#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl RunLimits {
    pub fn new(deadline: Option<Instant>, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// No deadline, and a token nobody else holds
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Error out if the deadline passed or the token was cancelled
    pub fn check(&self, program: &str) -> Result<(), CommandError> {
        if self.cancel.is_cancelled() {
            return Err(CommandError::Cancelled {
                program: program.to_owned(),
            });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(CommandError::TimedOut {
                program: program.to_owned(),
            });
        }
        Ok(())
    }
}

/// Run a command, returning its raw output handle.
///
/// IO handles will be captured only if the caller required it or if the log level is Debug.
/// In that last case, `stdout` and `stderr` will be logged.
///
/// The function returns an error if the command failed to execute, or if it had to be
/// killed because the deadline passed or the request was cancelled.
/// If the program runs but returns a non-0 status code, it will not trigger an error.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
    limits: &RunLimits,
) -> Result<Output, CommandError> {
    let is_debug = tracing::enabled!(tracing::Level::DEBUG);
    let get_io = |capture| {
        if capture {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };

    limits.check(program)?;

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(get_io(capture.contains(Capture::STDIN)))
        .stdout(get_io(is_debug || capture.contains(Capture::STDOUT)))
        .stderr(get_io(is_debug || capture.contains(Capture::STDERR)));

    debug!("Executing command: {cmd:?}");
    let io_err = |source| CommandError::Io {
        program: program.to_owned(),
        source,
    };
    let mut child = cmd.spawn().map_err(io_err)?;

    // Drain the pipes while waiting, or a chatty child blocks on a full pipe
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = wait_within_limits(&mut child, program, limits);

    let res = Output {
        status: status?,
        stdout: join_drain(stdout),
        stderr: join_drain(stderr),
    };

    if is_debug {
        debug!("status: {}", res.status);
        debug!("stdout: {} bytes long", res.stdout.len());
        trace!("stdout: {:?}", String::from_utf8_lossy(&res.stdout));
        debug!("stderr: {} bytes long", res.stderr.len());
        trace!("stderr: {:?}", String::from_utf8_lossy(&res.stderr));
    }

    Ok(res)
}

/// Run the command and verify that it has returned a success status code.
pub fn assert_success_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    limits: &RunLimits,
) -> Result<(), CommandError> {
    let res = run_command(program, f, Capture::STDERR, limits)?;
    ensure_success(program, res).map(|_| ())
}

/// Turn a non-0 status code into an error carrying the program stderr.
pub fn ensure_success(program: &str, res: Output) -> Result<Output, CommandError> {
    if res.status.success() {
        Ok(res)
    } else {
        Err(CommandError::Unsuccessful {
            program: program.to_owned(),
            status: res.status,
            stderr: String::from_utf8_lossy(&res.stderr).trim().to_owned(),
        })
    }
}

fn wait_within_limits(
    child: &mut Child,
    program: &str,
    limits: &RunLimits,
) -> Result<ExitStatus, CommandError> {
    loop {
        let exited = child.try_wait().map_err(|source| CommandError::Io {
            program: program.to_owned(),
            source,
        })?;
        if let Some(status) = exited {
            return Ok(status);
        }

        if let Err(err) = limits.check(program) {
            debug!("Killing {program}: {err}");
            // The child may have exited in between, nothing to do about it then
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
