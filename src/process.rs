use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn into_result(self, tool: &str) -> Result<CommandOutput, FetchError> {
        if self.status.success() {
            return Ok(self);
        }
        let stderr = self.stderr.trim();
        let message = if stderr.is_empty() {
            format!("exited with {}", self.status)
        } else {
            stderr.to_string()
        };
        Err(FetchError::ToolFailed {
            tool: tool.to_string(),
            message,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Toolkit {
    pub fasterq_dump: Option<PathBuf>,
    pub fastq_dump: Option<PathBuf>,
    pub esearch: Option<PathBuf>,
    pub efetch: Option<PathBuf>,
    pub sra_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub sra_toolkit: Option<String>,
    pub entrez_direct: bool,
}

impl Toolkit {
    pub fn detect() -> Self {
        let fasterq_dump =
            find_in_path("fasterq-dump").and_then(|path| check_tool(path, "fasterq-dump"));
        let fastq_dump = find_in_path("fastq-dump").and_then(|path| check_tool(path, "fastq-dump"));
        let sra_version = fasterq_dump
            .as_ref()
            .or(fastq_dump.as_ref())
            .and_then(|(_, version)| version.clone());
        let toolkit = Self {
            fasterq_dump: fasterq_dump.map(|(path, _)| path),
            fastq_dump: fastq_dump.map(|(path, _)| path),
            esearch: find_in_path("esearch"),
            efetch: find_in_path("efetch"),
            sra_version,
        };
        if toolkit.has_download_tool() {
            info!("SRA Toolkit detected");
        } else {
            warn!("SRA Toolkit not found. Install from: https://github.com/ncbi/sra-tools");
        }
        if !toolkit.has_entrez() {
            debug!("Entrez Direct not found, run discovery will use the built-in table");
        }
        toolkit
    }

    pub fn has_download_tool(&self) -> bool {
        self.fasterq_dump.is_some() || self.fastq_dump.is_some()
    }

    pub fn has_entrez(&self) -> bool {
        self.esearch.is_some() && self.efetch.is_some()
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            sra_toolkit: self.sra_version.clone(),
            entrez_direct: self.has_entrez(),
        }
    }
}

// A tool counts as present only when `--version` succeeds; its first output line is kept.
fn check_tool(path: PathBuf, name: &str) -> Option<(PathBuf, Option<String>)> {
    let output = run_with_timeout(Command::new(&path).arg("--version"), name, VERSION_TIMEOUT).ok()?;
    if !output.status.success() {
        return None;
    }
    let version = output
        .stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string);
    Some((path, version))
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

pub fn run_with_timeout(
    command: &mut Command,
    tool: &str,
    timeout: Duration,
) -> Result<CommandOutput, FetchError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = spawn(command, tool)?;
    wait_with_timeout(&mut child, tool, Instant::now() + timeout, timeout)
}

pub fn run_pipeline(
    mut first: Command,
    mut second: Command,
    tool: &str,
    timeout: Duration,
) -> Result<CommandOutput, FetchError> {
    let deadline = Instant::now() + timeout;
    first
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    let mut upstream = spawn(&mut first, tool)?;
    let pipe = upstream.stdout.take().ok_or_else(|| FetchError::ToolFailed {
        tool: tool.to_string(),
        message: "upstream stdout unavailable".to_string(),
    })?;
    second
        .stdin(Stdio::from(pipe))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let spawned = spawn(&mut second, tool);
    // Release the parent's copy of the pipe so the upstream sees EPIPE if downstream exits early.
    drop(second);
    let mut downstream = match spawned {
        Ok(child) => child,
        Err(err) => {
            terminate(&mut upstream);
            return Err(err);
        }
    };
    let output = match wait_with_timeout(&mut downstream, tool, deadline, timeout) {
        Ok(output) => output,
        Err(err) => {
            terminate(&mut upstream);
            return Err(err);
        }
    };
    let upstream_status = wait_or_kill(&mut upstream, deadline);
    match upstream_status {
        Some(status) if !status.success() && output.status.success() => {
            Err(FetchError::ToolFailed {
                tool: tool.to_string(),
                message: format!("upstream exited with {status}"),
            })
        }
        _ => Ok(output),
    }
}

// Each child leads its own process group so expiry can take down its helpers too.
fn spawn(command: &mut Command, tool: &str) -> Result<Child, FetchError> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            FetchError::MissingTool(tool.to_string())
        } else {
            FetchError::ToolFailed {
                tool: tool.to_string(),
                message: err.to_string(),
            }
        }
    })
}

fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_with_timeout(
    child: &mut Child,
    tool: &str,
    deadline: Instant,
    timeout: Duration,
) -> Result<CommandOutput, FetchError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    terminate(child);
                    return Err(FetchError::ToolTimeout {
                        tool: tool.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                return Err(FetchError::ToolFailed {
                    tool: tool.to_string(),
                    message: err.to_string(),
                });
            }
        }
    };

    // Descendants may still hold the pipes open after the child itself exits.
    let stdout = collect(&stdout, child, deadline);
    let stderr = collect(&stderr, child, deadline);
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn collect(receiver: &Receiver<String>, child: &mut Child, deadline: Instant) -> String {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match receiver.recv_timeout(remaining) {
        Ok(text) => text,
        Err(_) => {
            debug!(pid = child.id(), "output still held open at deadline, killing process group");
            terminate(child);
            receiver.recv_timeout(DRAIN_GRACE).unwrap_or_default()
        }
    }
}

fn wait_or_kill(child: &mut Child, deadline: Instant) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            _ => {
                terminate(child);
                return None;
            }
        }
    }
}

// Pipes are read on their own threads so a chatty child never blocks on a full buffer.
fn drain<R: Read + Send + 'static>(source: Option<R>) -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buffer);
        }
        let _ = sender.send(String::from_utf8_lossy(&buffer).into_owned());
    });
    receiver
}

pub fn render_command(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn captures_stdout_of_successful_command() {
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "echo hello"]),
            "sh",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn non_zero_exit_surfaces_stderr() {
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "echo broken >&2; exit 3"]),
            "sh",
            Duration::from_secs(5),
        )
        .unwrap();
        let err = output.into_result("sh").unwrap_err();
        assert_matches!(err, FetchError::ToolFailed { ref message, .. } if message == "broken");
    }

    #[test]
    fn slow_command_times_out() {
        let err = run_with_timeout(
            Command::new("sh").args(["-c", "sleep 5"]),
            "sh",
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert_matches!(err, FetchError::ToolTimeout { .. });
    }

    #[test]
    fn missing_binary_is_reported_as_missing_tool() {
        let err = run_with_timeout(
            &mut Command::new("definitely-not-a-real-tool-xyz"),
            "definitely-not-a-real-tool-xyz",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_matches!(err, FetchError::MissingTool(_));
    }

    #[test]
    fn pipeline_feeds_second_command() {
        let mut first = Command::new("sh");
        first.args(["-c", "printf 'a\\nb\\n'"]);
        let mut second = Command::new("sh");
        second.args(["-c", "tail -n 1"]);
        let output = run_pipeline(
            first,
            second,
            "pipe",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(output.stdout.trim(), "b");
    }

    #[test]
    fn background_descendant_cannot_outlive_deadline() {
        let started = Instant::now();
        let output = run_with_timeout(
            Command::new("sh").args(["-c", "sleep 4 & echo started; exit 0"]),
            "sh",
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert!(output.status.success());
    }

    #[test]
    fn hung_pipeline_is_bounded() {
        let mut first = Command::new("sh");
        first.args(["-c", "sleep 4 & exit 0"]);
        let mut second = Command::new("sh");
        second.args(["-c", "cat"]);
        let started = Instant::now();
        let err = run_pipeline(first, second, "pipe", Duration::from_millis(500)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert_matches!(err, FetchError::ToolTimeout { .. });
    }

    #[test]
    fn version_check_keeps_first_line() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("fasterq-dump");
        std::fs::write(&path, "#!/bin/sh\necho\necho 'fasterq-dump : 3.0.10'\necho extra\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (found, version) = check_tool(path.clone(), "fasterq-dump").unwrap();
        assert_eq!(found, path);
        assert_eq!(version.as_deref(), Some("fasterq-dump : 3.0.10"));
    }

    #[test]
    fn tool_info_reuses_detected_version() {
        let toolkit = Toolkit {
            fasterq_dump: Some(PathBuf::from("/nonexistent/fasterq-dump")),
            sra_version: Some("fasterq-dump : 3.0.10".to_string()),
            ..Toolkit::default()
        };
        let info = toolkit.tool_info();
        assert_eq!(info.sra_toolkit.as_deref(), Some("fasterq-dump : 3.0.10"));
        assert!(!info.entrez_direct);
    }
}
