//! Null-terminated command pipe to a radare2 child process.
//!
//! radare2 started with `-q0` answers each command on stdout and terminates
//! the output with a NUL byte, which makes framing trivial. A command that
//! exceeds its timeout kills the child; the pipe is unusable afterwards and
//! the session layer decides whether to restart.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use binlift_domain::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// One pipe to a running radare2 process.
pub(crate) struct R2Pipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl R2Pipe {
    /// Spawn radare2 against `target` and wait for the startup prompt.
    pub(crate) async fn spawn(
        engine_binary: &Path,
        target: &Path,
        startup_timeout: Duration,
    ) -> Result<Self> {
        let mut child = Command::new(engine_binary)
            .arg("-q0") // quiet, NUL-terminated outputs
            .arg("-2") // close stderr; diagnostics would corrupt framing
            .arg(target)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::EngineCrashed {
                message: format!("spawn {}: {e}", engine_binary.display()),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| Error::EngineCrashed {
            message: "child stdin unavailable".to_owned(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| Error::EngineCrashed {
            message: "child stdout unavailable".to_owned(),
        })?;

        let mut pipe = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        // r2 -q0 prints one NUL once it is ready for commands.
        pipe.read_frame("startup", startup_timeout).await?;
        Ok(pipe)
    }

    /// Run one command and return its output with the NUL terminator
    /// stripped.
    pub(crate) async fn command(&mut self, cmd: &str, timeout: Duration) -> Result<String> {
        debug!(cmd, "engine command");
        self.stdin
            .write_all(cmd.as_bytes())
            .await
            .map_err(|e| self.crashed(format!("write '{cmd}': {e}")))?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| self.crashed(format!("write '{cmd}': {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| self.crashed(format!("flush '{cmd}': {e}")))?;
        self.read_frame(cmd, timeout).await
    }

    async fn read_frame(&mut self, cmd: &str, timeout: Duration) -> Result<String> {
        let mut buf = Vec::new();
        let read = tokio::time::timeout(timeout, self.stdout.read_until(0, &mut buf)).await;
        match read {
            Err(_) => {
                warn!(cmd, timeout_secs = timeout.as_secs(), "engine timeout, killing process");
                let _ = self.child.start_kill();
                Err(Error::EngineTimeout {
                    command: cmd.to_owned(),
                    timeout_secs: timeout.as_secs(),
                })
            }
            Ok(Err(e)) => Err(self.crashed(format!("read '{cmd}': {e}"))),
            Ok(Ok(0)) => Err(self.crashed(format!("EOF during '{cmd}'"))),
            Ok(Ok(_)) => {
                if buf.last() == Some(&0) {
                    buf.pop();
                }
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
        }
    }

    fn crashed(&mut self, message: String) -> Error {
        let status = self
            .child
            .try_wait()
            .ok()
            .flatten()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "still running".to_owned());
        Error::EngineCrashed {
            message: format!("{message} (exit: {status})"),
        }
    }

    /// Ask the process to quit, falling back to a kill.
    pub(crate) async fn shutdown(mut self) {
        let _ = self.stdin.write_all(b"q!\n").await;
        let _ = self.stdin.flush().await;
        match tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
    }
}
