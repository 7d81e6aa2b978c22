//! Mock encoder implementations for tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{EncoderOutcome, EncoderProcess, EncoderSpawner};
use crate::error::CoreResult;

/// Scripted outcome for calls whose arguments contain a pattern.
#[derive(Debug, Clone)]
struct Failure {
    arg_pattern: String,
    stderr: String,
}

/// Records every invocation and succeeds by default. Creates the output
/// file named by the last argument so downstream steps (concat lists,
/// collision probing) see real paths. Shared handles observe the same call
/// log, so a clone can be moved into a scheduler thread while the test
/// keeps inspecting it.
#[derive(Clone, Default)]
pub struct MockSpawner {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    failures: Arc<Mutex<Vec<Failure>>>,
    unavailable: Arc<Mutex<bool>>,
}

pub struct MockProcess {
    outcome: EncoderOutcome,
}

impl MockSpawner {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes every call whose argument list contains `arg_pattern` fail
    /// with the given diagnostics.
    pub fn fail_when(&self, arg_pattern: &str, stderr: &str) {
        self.failures.lock().unwrap().push(Failure {
            arg_pattern: arg_pattern.to_string(),
            stderr: stderr.to_string(),
        });
    }

    /// Makes `verify` fail, simulating a missing encoder binary.
    pub fn set_unavailable(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    /// Undoes `set_unavailable`, simulating the binary appearing on PATH.
    pub fn set_available(&self) {
        *self.unavailable.lock().unwrap() = false;
    }

    pub fn received_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl EncoderSpawner for MockSpawner {
    type Process = MockProcess;

    fn verify(&self) -> CoreResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(crate::error::CoreError::EncoderMissing("ffmpeg".into()));
        }
        Ok(())
    }

    fn spawn(&self, args: &[String]) -> CoreResult<Self::Process> {
        self.calls.lock().unwrap().push(args.to_vec());

        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|f| args.iter().any(|a| a.contains(&f.arg_pattern)))
            .cloned();
        if let Some(failure) = failure {
            return Ok(MockProcess {
                outcome: EncoderOutcome {
                    success: false,
                    exit_code: Some(1),
                    stderr: failure.stderr,
                },
            });
        }

        if let Some(output) = args.last() {
            let path = PathBuf::from(output);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(&path, b"mock output");
        }

        Ok(MockProcess {
            outcome: EncoderOutcome {
                success: true,
                exit_code: Some(0),
                stderr: String::new(),
            },
        })
    }
}

impl EncoderProcess for MockProcess {
    fn wait_with_output(&mut self) -> CoreResult<EncoderOutcome> {
        Ok(self.outcome.clone())
    }
}
