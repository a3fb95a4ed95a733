// src/brew/runner.rs

//! Step execution
//!
//! Runs one opaque command step in a working directory, capturing exit
//! status and output. Production code shells out through [`ShellRunner`];
//! tests substitute a recording implementation via the [`StepRunner`] trait.

use crate::error::{Error, Result};
use crate::formula::Step;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured result of one step
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Last portion of combined output, for error reporting
    pub fn tail(&self, max_lines: usize) -> String {
        let combined = if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        };
        let lines: Vec<&str> = combined.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Runs steps in a working directory
pub trait StepRunner: Send + Sync {
    fn run(&self, step: &Step, workdir: &Path, env: &HashMap<String, String>)
    -> Result<StepOutput>;
}

/// Executes steps as child processes
pub struct ShellRunner {
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl StepRunner for ShellRunner {
    fn run(
        &self,
        step: &Step,
        workdir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<StepOutput> {
        debug!("running step: {} (in {})", step.label(), workdir.display());

        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }
        for (k, v) in &step.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::InitError(format!("failed to spawn '{}': {e}", step.program)))?;

        // Drain both pipes off-thread; a chatty step would otherwise fill
        // the pipe buffer and block against our wait()
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    child.kill()?;
                    child.wait()?;
                    return Ok(StepOutput {
                        status: None,
                        stdout: stdout.join().unwrap_or_default(),
                        stderr: format!("step timed out after {}s", timeout.as_secs()),
                    });
                }
            },
            None => child.wait()?,
        };

        Ok(StepOutput {
            status: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(program: &str, args: &[&str]) -> Step {
        Step {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
        }
    }

    #[test]
    fn test_successful_step_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::new(None);
        let out = runner
            .run(&step("echo", &["hello"]), dir.path(), &HashMap::new())
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_failing_step_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::new(None);
        let out = runner
            .run(&step("false", &[]), dir.path(), &HashMap::new())
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.status, Some(1));
    }

    #[test]
    fn test_step_env_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::new(None);
        let mut s = step("sh", &["-c", "echo $GREETING"]);
        s.env.insert("GREETING".into(), "hi".into());
        let out = runner.run(&s, dir.path(), &HashMap::new()).unwrap();
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[test]
    fn test_output_larger_than_pipe_buffer_is_drained() {
        // ~1.3 MB on each stream, far past the ~64 KB pipe buffer
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::new(None);
        let script = "yes 0123456789012345678901234567890123456789012345678901234567890123 \
                      | head -n 20000 | tee /dev/stderr";
        let out = runner
            .run(&step("sh", &["-c", script]), dir.path(), &HashMap::new())
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.len() > 1_000_000);
        assert!(out.stderr.len() > 1_000_000);
    }

    #[test]
    fn test_timeout_kills_step() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ShellRunner::new(Some(Duration::from_millis(100)));
        let out = runner
            .run(&step("sleep", &["10"]), dir.path(), &HashMap::new())
            .unwrap();
        assert!(!out.success());
        assert!(out.stderr.contains("timed out"));
    }

    #[test]
    fn test_output_tail() {
        let out = StepOutput {
            status: Some(1),
            stdout: "one\ntwo\nthree".into(),
            stderr: String::new(),
        };
        assert_eq!(out.tail(2), "two\nthree");
        assert_eq!(out.tail(10), "one\ntwo\nthree");
    }
}
