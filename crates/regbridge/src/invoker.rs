//! Registration tool subprocess invocation.
//!
//! The tool is run synchronously as
//! `elastix -f <fixed> -m <moving> -out <dir> -p <params>` and writes its
//! artifacts into `<dir>`. A failed run is terminal; nothing here retries.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::{RegistrationError, RegistrationResult};

/// Environment variable that overrides tool discovery.
pub const TOOL_PATH_ENV: &str = "ELASTIX_PATH";

/// Executable name searched for on PATH.
pub const TOOL_NAME: &str = "elastix";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long stderr is drained after the tool exits. A process the tool left
/// running can hold the pipe open indefinitely.
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Configuration for the registration tool invoker.
#[derive(Debug, Clone, Default)]
pub struct InvokerConfig {
    /// Explicit path to the tool executable.
    pub tool_path: Option<PathBuf>,
    /// Kill the tool after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Working directory for the subprocess.
    pub working_dir: Option<PathBuf>,
}

impl InvokerConfig {
    /// Sets the tool executable path.
    pub fn tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = Some(path.into());
        self
    }

    /// Sets the timeout duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Sets the subprocess working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Outcome of a tool run that exited successfully.
#[derive(Debug, Clone)]
pub struct ToolRun {
    /// Wall-clock time the tool ran for.
    pub elapsed: Duration,
    /// Captured stderr. Empty in verbose mode, where output is passed through.
    pub stderr: String,
}

/// Runs the registration tool.
#[derive(Debug, Clone, Default)]
pub struct Invoker {
    config: InvokerConfig,
}

impl Invoker {
    /// Creates an invoker with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an invoker with the given configuration.
    pub fn with_config(config: InvokerConfig) -> Self {
        Self { config }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Finds the tool executable.
    pub fn find_tool(&self) -> RegistrationResult<PathBuf> {
        // Check config override first
        if let Some(ref path) = self.config.tool_path {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        if let Ok(path) = std::env::var(TOOL_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        if let Ok(path) = which::which(TOOL_NAME) {
            return Ok(path);
        }

        let common_paths: &[&str] = if cfg!(windows) {
            &[
                "C:\\Program Files\\elastix\\elastix.exe",
                "C:\\elastix\\elastix.exe",
            ]
        } else {
            &[
                "/usr/bin/elastix",
                "/usr/local/bin/elastix",
                "/opt/elastix/bin/elastix",
            ]
        };

        common_paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or(RegistrationError::ToolNotFound)
    }

    /// Builds the tool command line without spawning it.
    pub fn build_command(
        &self,
        tool: &Path,
        fixed: &Path,
        moving: &Path,
        out_dir: &Path,
        param_file: &Path,
    ) -> Command {
        let mut cmd = Command::new(tool);
        cmd.arg("-f")
            .arg(fixed)
            .arg("-m")
            .arg(moving)
            .arg("-out")
            .arg(out_dir)
            .arg("-p")
            .arg(param_file);

        if let Some(ref cwd) = self.config.working_dir {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Runs the tool and blocks until it exits.
    ///
    /// When `verbose` is false stdout is discarded and stderr is captured so
    /// it can be attached to a [`RegistrationError::RegistrationFailed`].
    pub fn run(
        &self,
        fixed: &Path,
        moving: &Path,
        out_dir: &Path,
        param_file: &Path,
        verbose: bool,
    ) -> RegistrationResult<ToolRun> {
        validate_parameter_file(param_file)?;
        let tool = self.find_tool()?;

        let mut cmd = self.build_command(&tool, fixed, moving, out_dir, param_file);
        cmd.stdin(Stdio::null());
        if verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        }

        tracing::debug!(tool = %tool.display(), out_dir = %out_dir.display(), "spawning registration tool");
        let start = Instant::now();
        let child = cmd.spawn().map_err(RegistrationError::SpawnFailed)?;

        let (status, stderr) = wait_with_timeout(child, self.config.timeout)?;
        let elapsed = start.elapsed();

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            tracing::debug!(exit_code, "registration tool failed");
            return Err(RegistrationError::registration_failed(exit_code, stderr));
        }

        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "registration tool finished");
        Ok(ToolRun { elapsed, stderr })
    }
}

/// Checks that the parameter file exists and can be opened for reading.
pub fn validate_parameter_file(path: &Path) -> RegistrationResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RegistrationError::invalid_parameter_file(path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(RegistrationError::invalid_parameter_file(
            path,
            "not a regular file",
        ));
    }
    File::open(path)
        .map_err(|e| RegistrationError::invalid_parameter_file(path, e.to_string()))?;
    Ok(())
}

fn wait_with_timeout(
    mut child: Child,
    timeout: Option<Duration>,
) -> RegistrationResult<(ExitStatus, String)> {
    // Drain stderr on its own thread so a chatty tool cannot fill the pipe and stall.
    let stderr_lines = child.stderr.take().map(|err| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut reader = BufReader::new(err);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(String::from_utf8_lossy(&line).into_owned()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        rx
    });

    let status = match timeout {
        None => child.wait().map_err(RegistrationError::SpawnFailed)?,
        Some(timeout) => {
            let start = Instant::now();
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {
                        if start.elapsed() > timeout {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(RegistrationError::Timeout {
                                timeout_secs: timeout.as_secs(),
                            });
                        }
                        std::thread::sleep(POLL_INTERVAL);
                    }
                    Err(e) => return Err(RegistrationError::SpawnFailed(e)),
                }
            }
        }
    };

    let stderr = stderr_lines
        .map(|rx| collect_stderr(&rx, STDERR_GRACE))
        .unwrap_or_default();

    Ok((status, stderr))
}

/// Gathers stderr lines until the pipe closes or `grace` runs out.
fn collect_stderr(lines: &Receiver<String>, grace: Duration) -> String {
    let deadline = Instant::now() + grace;
    let mut stderr = String::new();
    loop {
        match lines.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(line) => stderr.push_str(&line),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("stderr still open after tool exit, keeping what was read");
                break;
            }
        }
    }
    stderr
}
