//! Repository acquisition.
//!
//! A [`RepositoryAcquirer`] produces a shallow local working copy; a
//! [`WorkingCopy`] owns that directory and removes it when dropped, so the
//! copy is gone on every exit path of a pipeline run.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Produces a local copy of a remote repository.
pub trait RepositoryAcquirer {
    /// Places a single-revision working copy of `repo_url` at `destination`,
    /// replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Acquisition`] when the copy cannot be produced.
    fn acquire(&self, repo_url: &str, destination: &Path) -> Result<()>;
}

/// Acquirer that shells out to `git clone --depth 1`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
}

impl GitCli {
    /// Uses the `git` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Uses a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryAcquirer for GitCli {
    fn acquire(&self, repo_url: &str, destination: &Path) -> Result<()> {
        if destination.exists() {
            fs::remove_dir_all(destination).map_err(|e| Error::io(destination, e))?;
            debug!("Removed existing directory {}", destination.display());
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let output = Command::new(&self.program)
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(repo_url)
            .arg(destination)
            .output()
            .map_err(|e| Error::acquisition(repo_url, format!("failed to launch git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("git exited with {}", output.status)
            } else {
                stderr
            };
            return Err(Error::acquisition(repo_url, message));
        }

        info!(
            "Successfully cloned repository to {}",
            destination.display()
        );
        Ok(())
    }
}

/// A working copy that is deleted when this value goes out of scope.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
}

impl WorkingCopy {
    /// Takes ownership of the directory at `path`, which need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the working copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }

        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed working copy {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove working copy {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Derives a repository name from the last segment of its URL, without `.git`.
#[must_use]
pub fn repository_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}
