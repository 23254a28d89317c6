use crate::error::{FlashError, FlashResult};
use log::{debug, error, warn};
use std::process::{Command, Output};

/// What to run: an argument vector, or a line handed to `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Argv { program: String, args: Vec<String> },
    Shell(String),
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Prepends `prefix` (typically `sudo`) when one is configured.
    pub fn elevated(prefix: Option<&str>, program: impl Into<String>, args: Vec<String>) -> Self {
        match prefix {
            Some(prefix) => {
                let mut full = vec![program.into()];
                full.extend(args);
                Invocation::new(prefix, full)
            }
            None => Invocation::new(program, args),
        }
    }

    pub fn program(&self) -> &str {
        match self {
            Invocation::Argv { program, .. } => program,
            Invocation::Shell(_) => "sh",
        }
    }

    /// Shell-quoted form, for logs and error reports.
    pub fn printable(&self) -> String {
        match self {
            Invocation::Argv { program, args } => std::iter::once(program)
                .chain(args.iter())
                .map(|part| shell_quote(part))
                .collect::<Vec<_>>()
                .join(" "),
            Invocation::Shell(line) => line.clone(),
        }
    }

    fn to_command(&self) -> Command {
        match self {
            Invocation::Argv { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            Invocation::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
        }
    }
}

/// Whether a non-zero exit stops the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Non-zero exit becomes `FlashError::CommandExecution`.
    Fatal,
    /// Result is returned whatever the exit code (unmount, sync, eject).
    BestEffort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal or never started.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Runs external tools synchronously, exactly once per call.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation, check: Check) -> FlashResult<CommandOutput>;
}

/// Delegates to `std::process::Command`, capturing stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, check: Check) -> FlashResult<CommandOutput> {
        debug!("exec: {}", invocation.printable());
        let output = match invocation.to_command().output() {
            Ok(output) => CommandOutput::from(output),
            Err(err) => CommandOutput {
                status: None,
                stdout: String::new(),
                stderr: format!("failed to start {}: {}", invocation.program(), err),
            },
        };
        settle(invocation, check, output)
    }
}

/// Applies the `check` policy to a finished invocation.
pub fn settle(invocation: &Invocation, check: Check, output: CommandOutput) -> FlashResult<CommandOutput> {
    if output.succeeded() {
        return Ok(output);
    }
    match check {
        Check::BestEffort => {
            warn!(
                "ignoring failure of {} (status {:?}): {}",
                invocation.printable(),
                output.status,
                output.stderr.trim()
            );
            Ok(output)
        }
        Check::Fatal => {
            let command = invocation.printable();
            error!("Command failed: {}", command);
            if !output.stdout.is_empty() {
                error!("{}", output.stdout.trim_end());
            }
            if !output.stderr.is_empty() {
                error!("{}", output.stderr.trim_end());
            }
            Err(FlashError::CommandExecution {
                command,
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "@%+=:,./-_".contains(ch));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\"'\"'"))
    }
}
