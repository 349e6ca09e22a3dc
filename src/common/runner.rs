//! External command execution
//!
//! Everything backgrounder does to the desktop goes through a handful of
//! external programs (`gsettings`, `pkexec chmod`, `pkexec chown`). They are
//! run through [`CommandRunner`] so callers can be exercised without touching
//! the real desktop.

use std::io;

use crate::common::shell::command_line;
use crate::ui::prelude::*;

/// Result of a finished external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human readable reason for a failed command
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        match (self.code, stderr.is_empty()) {
            (Some(code), true) => format!("exit code {code}"),
            (Some(code), false) => format!("exit code {code}: {stderr}"),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {stderr}"),
        }
    }
}

/// Runs one external command to completion.
///
/// Implementations block until the process exits. A non-zero exit is not an
/// error at this level; only failing to start or wait for the process is.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs commands on the host system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        emit(
            Level::Debug,
            "command.run",
            &format!("$ {}", command_line(program, args)),
            None,
        );

        let output = duct::cmd(program, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Prints commands instead of running them
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        emit(
            Level::Info,
            "command.dry_run",
            &format!("[dry run] {}", command_line(program, args)),
            Some(serde_json::json!({ "program": program, "args": args })),
        );
        Ok(CommandOutput::success())
    }
}
