//! External encoder interactions.
//!
//! The pipeline never calls ffmpeg directly; it goes through the
//! [`EncoderSpawner`]/[`EncoderProcess`] traits so the full processing path
//! can run against mocks. The production implementation drives ffmpeg
//! through `ffmpeg-sidecar`.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};

use crate::error::{command_failed_error, CoreError, CoreResult};

#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

/// Result of one finished encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Error-level diagnostics collected from the encoder's output.
    pub stderr: String,
}

impl EncoderOutcome {
    /// Converts a failed outcome into a `CommandFailed` error carrying the
    /// collected diagnostics.
    pub fn into_result(self, cmd: &str) -> CoreResult<()> {
        if self.success {
            Ok(())
        } else {
            Err(command_failed_error(cmd, self.exit_code, self.stderr))
        }
    }
}

/// An encoder process that has been spawned and not yet reaped.
pub trait EncoderProcess {
    /// Drains the process output and waits for it to exit.
    fn wait_with_output(&mut self) -> CoreResult<EncoderOutcome>;
}

/// Something that can launch the external encoder with a prepared argument
/// list.
pub trait EncoderSpawner {
    type Process: EncoderProcess;

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process>;

    /// Confirms the encoder binary can be launched at all. The scheduler
    /// calls this before admitting a task.
    fn verify(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Production spawner backed by `ffmpeg-sidecar`.
#[derive(Debug, Clone, Default)]
pub struct SidecarSpawner {
    /// Explicit ffmpeg binary path; `None` resolves via `PATH`.
    pub ffmpeg_path: Option<std::path::PathBuf>,
}

pub struct SidecarProcess(ffmpeg_sidecar::child::FfmpegChild);

impl EncoderSpawner for SidecarSpawner {
    type Process = SidecarProcess;

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process> {
        let mut cmd = match &self.ffmpeg_path {
            Some(path) => FfmpegCommand::new_with_path(path),
            None => FfmpegCommand::new(),
        };
        cmd.args(args.iter().map(String::as_str));
        log::debug!("spawning ffmpeg {}", args.join(" "));
        cmd.spawn()
            .map(SidecarProcess)
            .map_err(|e| command_failed_error("ffmpeg", None, format!("failed to start: {e}")))
    }

    fn verify(&self) -> CoreResult<()> {
        check_encoder(self.ffmpeg_path.as_deref())
    }
}

impl EncoderProcess for SidecarProcess {
    fn wait_with_output(&mut self) -> CoreResult<EncoderOutcome> {
        let mut stderr = String::new();
        let events = self
            .0
            .iter()
            .map_err(|e| command_failed_error("ffmpeg", None, e.to_string()))?;
        for event in events {
            match event {
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, line)
                | FfmpegEvent::Error(line) => {
                    if !stderr.is_empty() {
                        stderr.push('\n');
                    }
                    stderr.push_str(&line);
                }
                _ => {}
            }
        }
        let status = self
            .0
            .wait()
            .map_err(|e| command_failed_error("ffmpeg", None, e.to_string()))?;
        Ok(EncoderOutcome {
            success: status.success(),
            exit_code: status.code(),
            stderr,
        })
    }
}

/// Spawns the encoder and waits for it, folding a failure exit into an
/// error.
pub fn run_encoder<S: EncoderSpawner>(spawner: &S, cmd_label: &str, args: &[String]) -> CoreResult<()> {
    spawner
        .spawn(args)?
        .wait_with_output()?
        .into_result(cmd_label)
}

/// Verifies the encoder binary exists and starts. Called once before the
/// scheduler accepts work.
pub fn check_encoder(ffmpeg_path: Option<&Path>) -> CoreResult<()> {
    let program = ffmpeg_path
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ffmpeg".to_string());

    let result = Command::new(&program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(status) if status.success() => {
            log::debug!("found encoder: {program}");
            Ok(())
        }
        Ok(status) => Err(command_failed_error(
            &program,
            status.code(),
            "version check failed",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CoreError::EncoderMissing(program))
        }
        Err(e) => Err(CoreError::CommandStart(program, e)),
    }
}
