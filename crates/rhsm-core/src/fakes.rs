//! In-memory fakes for the context and sleeper seams (testing only)
//!
//! `FakeActions` replays scripted command results and keeps a tiny
//! directory tree in memory; every call and filesystem mutation is
//! recorded in order. `RecordingSleeper` records requested delays instead
//! of blocking.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::{CommandOutput, IsolatedActions};
use crate::error::RunError;
use crate::retry::Sleeper;

// ---------------------------------------------------------------------------
// FakeResponse
// ---------------------------------------------------------------------------

/// Scripted outcome of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeResponse {
    /// Exit 0 with the given output
    Success { stdout: String, stderr: String },
    /// Non-zero exit
    Failure { exit_code: i32, stderr: String },
    /// The binary could not be started
    Missing,
}

impl FakeResponse {
    /// Successful run printing `stdout`
    pub fn stdout(stdout: &str) -> Self {
        FakeResponse::Success {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Successful run with both streams
    pub fn output(stdout: &str, stderr: &str) -> Self {
        FakeResponse::Success {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    /// Failed run with exit code 1
    pub fn failure(stderr: &str) -> Self {
        FakeResponse::Failure {
            exit_code: 1,
            stderr: stderr.to_string(),
        }
    }

    fn into_result(self, args: &[&str]) -> Result<CommandOutput, RunError> {
        match self {
            FakeResponse::Success { stdout, stderr } => Ok(CommandOutput {
                exit_code: 0,
                stdout,
                stderr,
            }),
            FakeResponse::Failure { exit_code, stderr } => Err(RunError::NonZero {
                args: args.iter().map(|a| a.to_string()).collect(),
                exit_code,
                stdout: String::new(),
                stderr,
            }),
            FakeResponse::Missing => Err(RunError::Launch {
                program: args.first().copied().unwrap_or_default().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeActions
// ---------------------------------------------------------------------------

/// Operation observed by a [`FakeActions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOp {
    Call(Vec<String>),
    Remove(String),
    CopyTo { src: PathBuf, dest: String },
}

/// Scriptable in-memory isolation context.
///
/// A command with several scripted responses consumes them in order and
/// repeats the last one. Unscripted commands behave like a missing binary.
#[derive(Debug, Default)]
pub struct FakeActions {
    isolated: bool,
    responses: RefCell<HashMap<Vec<String>, VecDeque<FakeResponse>>>,
    dirs: RefCell<BTreeMap<String, BTreeSet<String>>>,
    failing_removals: BTreeSet<String>,
    ops: RefCell<Vec<FakeOp>>,
}

fn key(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

impl FakeActions {
    /// Fake standing in for the host root
    pub fn host() -> Self {
        Self::default()
    }

    /// Fake standing in for an isolated target root
    pub fn isolated() -> Self {
        FakeActions {
            isolated: true,
            ..Self::default()
        }
    }

    /// Script the next response for `args`
    pub fn on_call(self, args: &[&str], response: FakeResponse) -> Self {
        self.responses
            .borrow_mut()
            .entry(key(args))
            .or_default()
            .push_back(response);
        self
    }

    /// Create a directory holding the given file names
    pub fn with_dir(self, dir: &str, files: &[&str]) -> Self {
        self.dirs
            .borrow_mut()
            .entry(dir.to_string())
            .or_default()
            .extend(files.iter().map(|f| f.to_string()));
        self
    }

    /// Make removal of `path` fail with a permission error
    pub fn failing_remove(mut self, path: &str) -> Self {
        self.failing_removals.insert(path.to_string());
        self
    }

    /// Every operation seen so far, in order
    pub fn ops(&self) -> Vec<FakeOp> {
        self.ops.borrow().clone()
    }

    /// Argument vectors of every command run so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                FakeOp::Call(args) => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many times `args` was run
    pub fn call_count(&self, args: &[&str]) -> usize {
        let wanted = key(args);
        self.calls().iter().filter(|c| **c == wanted).count()
    }

    /// Files currently in `dir`, sorted
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        self.dirs
            .borrow()
            .get(dir)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl IsolatedActions for FakeActions {
    fn call(&self, args: &[&str]) -> Result<CommandOutput, RunError> {
        self.ops.borrow_mut().push(FakeOp::Call(key(args)));

        let mut responses = self.responses.borrow_mut();
        let response = match responses.get_mut(&key(args)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        response.unwrap_or(FakeResponse::Missing).into_result(args)
    }

    fn full_path(&self, path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    fn is_isolated(&self) -> bool {
        self.isolated
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.borrow().contains_key(path)
    }

    fn list_files(&self, path: &str) -> io::Result<Vec<String>> {
        self.dirs
            .borrow()
            .get(path)
            .map(|files| files.iter().cloned().collect())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn copy_to(&self, src: &Path, dest: &str) -> io::Result<()> {
        self.ops.borrow_mut().push(FakeOp::CopyTo {
            src: src.to_path_buf(),
            dest: dest.to_string(),
        });
        let (dir, name) = split(dest);
        match self.dirs.borrow_mut().get_mut(dir) {
            Some(files) => {
                files.insert(name.to_string());
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, dir.to_string())),
        }
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        self.ops.borrow_mut().push(FakeOp::Remove(path.to_string()));
        if self.failing_removals.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                path.to_string(),
            ));
        }
        let (dir, name) = split(path);
        let removed = self
            .dirs
            .borrow_mut()
            .get_mut(dir)
            .is_some_and(|files| files.remove(name));
        if removed {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSleeper
// ---------------------------------------------------------------------------

/// Sleeper that returns immediately and remembers what it was asked.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Sleeper with no recorded delays
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}
