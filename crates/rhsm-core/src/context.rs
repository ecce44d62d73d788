//! Isolation contexts
//!
//! An isolation context is the filesystem root that commands run under:
//! either the host itself or a chroot-style target root. Everything in this
//! crate talks to the system only through [`IsolatedActions`], so the same
//! operations run against the host, a target root, or a test fake.

use crate::error::RunError;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Captured result of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status (always 0 for a successful call)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

/// Command execution and filesystem primitives inside a target root.
///
/// Paths given to the filesystem methods are absolute paths *inside* the
/// context (e.g. `/etc/pki/product`); [`full_path`](Self::full_path) maps
/// them to where they live from the caller's point of view.
pub trait IsolatedActions {
    /// Run an argument vector inside the context.
    ///
    /// Returns [`RunError::Launch`] when the process could not be started
    /// and [`RunError::NonZero`] when it exited unsuccessfully.
    fn call(&self, args: &[&str]) -> Result<CommandOutput, RunError>;

    /// Resolve a path inside the context to a path usable by the caller
    fn full_path(&self, path: &str) -> PathBuf;

    /// Whether this context is an isolated root rather than the host
    fn is_isolated(&self) -> bool;

    /// Whether `path` is a directory inside the context
    fn is_dir(&self, path: &str) -> bool {
        self.full_path(path).is_dir()
    }

    /// Names of the regular files directly inside `path`, sorted
    fn list_files(&self, path: &str) -> io::Result<Vec<String>> {
        let dir = self.full_path(path);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copy a file from the caller's filesystem into the context
    fn copy_to(&self, src: &Path, dest: &str) -> io::Result<()> {
        std::fs::copy(src, self.full_path(dest)).map(|_| ())
    }

    /// Remove a file inside the context
    fn remove(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.full_path(path))
    }
}

/// Run a prepared command and classify the outcome
fn run_command(mut cmd: Command, args: &[&str]) -> Result<CommandOutput, RunError> {
    let program = args.first().copied().unwrap_or_default().to_string();

    let output = cmd.output().map_err(|source| RunError::Launch {
        program: program.clone(),
        source,
    })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    debug!(program = %program, exit_code, "command finished");

    if !output.status.success() {
        return Err(RunError::NonZero {
            args: args.iter().map(|a| a.to_string()).collect(),
            exit_code,
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

fn empty_command() -> RunError {
    RunError::Launch {
        program: String::new(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector"),
    }
}

/// Actions performed directly on the host root
#[derive(Debug, Clone, Copy, Default)]
pub struct HostActions;

impl HostActions {
    /// Create host actions
    pub fn new() -> Self {
        HostActions
    }
}

impl IsolatedActions for HostActions {
    fn call(&self, args: &[&str]) -> Result<CommandOutput, RunError> {
        let (program, rest) = args.split_first().ok_or_else(empty_command)?;
        debug!(?args, "running on host");

        let mut cmd = Command::new(program);
        cmd.args(rest);
        run_command(cmd, args)
    }

    fn full_path(&self, path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    fn is_isolated(&self) -> bool {
        false
    }
}

/// Actions performed inside a chroot-style target root
#[derive(Debug, Clone)]
pub struct ChrootActions {
    root: PathBuf,
}

impl ChrootActions {
    /// Create actions for the target root at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ChrootActions { root: root.into() }
    }

    /// The target root on the host
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl IsolatedActions for ChrootActions {
    fn call(&self, args: &[&str]) -> Result<CommandOutput, RunError> {
        if args.is_empty() {
            return Err(empty_command());
        }
        debug!(root = %self.root.display(), ?args, "running in chroot");

        let mut cmd = Command::new("chroot");
        cmd.arg(&self.root).args(args);
        run_command(cmd, args)
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn is_isolated(&self) -> bool {
        true
    }
}
