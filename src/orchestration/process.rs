//! External process execution

use crate::error::WarehouseError;
use eyre::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// A program invocation that can be logged, inspected and run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    envs: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Path arguments are passed through lossily
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs.get(key).map(String::as_str)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.envs).kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl std::fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

fn spawn_error(command: &ProcessCommand, err: std::io::Error) -> WarehouseError {
    if err.kind() == std::io::ErrorKind::NotFound {
        WarehouseError::Processing(format!("command not found: {}", command.program))
    } else {
        WarehouseError::Processing(format!("failed to start {}: {}", command.program, err))
    }
}

fn exit_error(command: &ProcessCommand, status: std::process::ExitStatus, stderr: &str) -> WarehouseError {
    let code = status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let mut message = format!("`{}` exited with code {}", command, code);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(stderr);
    }
    WarehouseError::Processing(message)
}

/// Runs [`ProcessCommand`]s, streaming or capturing their output
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    dry_run: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log commands instead of running them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run with inherited stdio, failing on a non-zero exit
    pub async fn run(&self, command: &ProcessCommand) -> Result<()> {
        log::info!("Running: {}", command);
        if self.dry_run {
            return Ok(());
        }

        let status = command
            .to_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| spawn_error(command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(exit_error(command, status, "").into())
        }
    }

    /// Run and return captured stdout
    pub async fn output(&self, command: &ProcessCommand) -> Result<String> {
        log::debug!("Running: {}", command);
        if self.dry_run {
            return Ok(String::new());
        }

        let output = command
            .to_command()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(command, e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(exit_error(command, output.status, &stderr).into())
        }
    }
}
