//! Line-oriented JSON transport to the bridge process.
//!
//! The bridge speaks one JSON object per line on stdin/stdout. A reader
//! thread forwards stdout lines through a channel so each wait for a
//! response can be bounded by the configured timeout.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use xlops_protocol::{Request, Response};

use crate::bridge::ExcelBridgeConfig;
use crate::error::{BridgeError, Result};

/// A channel that carries one request and returns its response.
///
/// [`ProcessTransport`] talks to the WINE bridge process. Other
/// implementations (an in-process engine, a recorded session) can be
/// plugged into [`ExcelBridge::with_transport`](crate::ExcelBridge::with_transport).
pub trait Transport {
    /// Send `request` and wait for the matching response.
    fn round_trip(&mut self, request: &Request) -> Result<Response>;

    /// Release the channel after `Shutdown`, whether or not it succeeded.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport over the stdio of a `wine xlops-com-bridge.exe` child process.
pub struct ProcessTransport {
    child: Child,
    /// `None` once closed; the bridge exits when it sees EOF.
    stdin: Option<ChildStdin>,
    lines: Receiver<std::io::Result<String>>,
    timeout: Duration,
}

impl ProcessTransport {
    /// Spawn the bridge process described by `config`.
    pub fn spawn(config: &ExcelBridgeConfig) -> Result<Self> {
        let exe_path = config
            .bridge_exe_path
            .clone()
            .unwrap_or_else(find_bridge_exe);

        if !exe_path.exists() {
            return Err(BridgeError::BridgeExeNotFound(
                exe_path.display().to_string(),
            ));
        }

        let mut cmd = std::process::Command::new(&config.wine_path);

        if let Some(prefix) = &config.wine_prefix {
            cmd.env("WINEPREFIX", prefix);
        }

        cmd.arg(&exe_path);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        tracing::info!("Starting Excel bridge: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::WineNotFound
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BridgeError::NotRunning);
            }
        };

        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name("xlops-bridge-stdout".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines,
            timeout: config.timeout,
        })
    }

    fn read_line(&self, deadline: Instant) -> Result<String> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(Ok(line)) if line.trim().is_empty() => continue,
                Ok(Ok(line)) => return Ok(line),
                Ok(Err(e)) => return Err(BridgeError::ReadFailed(e.to_string())),
                Err(RecvTimeoutError::Timeout) => return Err(BridgeError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::NotRunning),
            }
        }
    }

    /// Wait for the child to exit, killing it once `timeout` has passed.
    fn reap(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                tracing::info!("Excel bridge exited with {status}");
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::warn!("Excel bridge did not exit within {:?}, killing it", self.timeout);
                let _ = self.child.kill();
                self.child.wait()?;
                return Err(BridgeError::Timeout(self.timeout));
            }
            thread::sleep(REAP_POLL);
        }
    }
}

const REAP_POLL: Duration = Duration::from_millis(20);

impl Transport for ProcessTransport {
    fn round_trip(&mut self, request: &Request) -> Result<Response> {
        let json = serde_json::to_string(request)?;
        let stdin = self.stdin.as_mut().ok_or(BridgeError::NotRunning)?;

        writeln!(stdin, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        stdin
            .flush()
            .map_err(|e| BridgeError::SendFailed(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let line = self.read_line(deadline)?;
            let response: Response = serde_json::from_str(&line)?;

            // A reply to a request that already timed out; id 0 answers an
            // unparseable request and is passed on
            if response.id != 0 && response.id < request.id {
                tracing::debug!(
                    stale = response.id,
                    expected = request.id,
                    "discarding late bridge response"
                );
                continue;
            }
            return Ok(response);
        }
    }

    fn close(&mut self) -> Result<()> {
        drop(self.stdin.take());
        self.reap()
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        // Reap the child even if it never acknowledged Shutdown
        drop(self.stdin.take());
        if let Ok(None) = self.child.try_wait() {
            tracing::warn!("Excel bridge still running, killing it");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Attempt to locate the bridge exe relative to the current executable or in common paths.
fn find_bridge_exe() -> PathBuf {
    const EXE_NAME: &str = "xlops-com-bridge.exe";

    // Check next to the current executable
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join(EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    // Check in the target directory (for development)
    for profile in ["release", "debug"] {
        let candidate = PathBuf::from("target/x86_64-pc-windows-gnu")
            .join(profile)
            .join(EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    // Default: assume it's in the current directory
    PathBuf::from(EXE_NAME)
}
