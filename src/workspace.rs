//! Per-scenario workspace directories.
//!
//! Each scenario owns one directory under a fixed root, namespaced by the
//! owning suite and the scenario's display name. Directories are created on
//! first access and removed on cleanup unless cleanup was suppressed.
//!
//! Every created directory is also registered with a process-wide safety net
//! so that a run interrupted before teardown does not leave workspaces behind.
//! The net is drained by a signal hook (SIGINT, SIGTERM, SIGHUP) installed on
//! first use. A normal exit does not drain it: callers outside the CLI that
//! exit without tearing down should call [`run_safety_cleanup`] themselves.
//! A [`Workspace`] dropped without cleanup removes its own directory.

use crate::error::WorkspaceError;
use crate::retry::{RetryError, retry};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Default root for workspaces. The space is deliberate: every scenario then
/// runs the build tool from a path containing a space.
pub const DEFAULT_ROOT: &str = "target/tmp/test files";

const CLEANUP_ATTEMPTS: u32 = 3;
const MAX_SEGMENT_LEN: usize = 64;

/// Allocates workspaces for one owning suite.
#[derive(Debug, Clone)]
pub struct WorkspaceProvider {
    root: PathBuf,
    owner: String,
    strict: bool,
}

impl WorkspaceProvider {
    pub fn new(root: impl Into<PathBuf>, owner: &str) -> Self {
        Self {
            root: root.into(),
            owner: sanitize_segment(owner),
            strict: false,
        }
    }

    /// Propagate cleanup errors instead of logging them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every workspace of this owner.
    pub fn owner_dir(&self) -> PathBuf {
        self.root.join(&self.owner)
    }

    /// Reserves a unique workspace for `display_name`. The directory itself is
    /// created on first access.
    pub fn acquire(&self, display_name: &str) -> Workspace {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", sanitize_segment(display_name), &unique[..8]);
        Workspace {
            path: self.owner_dir().join(name),
            created: false,
            suppressed: false,
            strict: self.strict,
        }
    }
}

/// A directory exclusively owned by one scenario.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    created: bool,
    suppressed: bool,
    strict: bool,
}

impl Workspace {
    /// Location of the workspace, whether or not it exists yet.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the directory, creating it if needed.
    pub fn dir(&mut self) -> Result<&Path, WorkspaceError> {
        if !self.created {
            std::fs::create_dir_all(&self.path).map_err(|source| WorkspaceError::Create {
                path: self.path.clone(),
                source,
            })?;
            self.created = true;
            register_for_safety_cleanup(&self.path);
            debug!(path = %self.path.display(), "created workspace");
        }
        Ok(&self.path)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Keep the directory on disk past cleanup, for post-mortem inspection.
    pub fn suppress_cleanup(&mut self) {
        self.suppressed = true;
        deregister(&self.path);
    }

    pub fn is_cleanup_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Recursively removes the directory.
    ///
    /// Removal failures are logged and swallowed unless the provider was strict.
    pub fn cleanup(&mut self) -> Result<(), WorkspaceError> {
        if self.suppressed {
            if self.created {
                info!(path = %self.path.display(), "keeping workspace");
            }
            return Ok(());
        }
        if !self.created {
            return Ok(());
        }

        match remove_dir(&self.path, CLEANUP_ATTEMPTS) {
            Ok(()) => {
                deregister(&self.path);
                self.created = false;
                debug!(path = %self.path.display(), "removed workspace");
                Ok(())
            }
            Err(err) if self.strict => Err(err),
            Err(err) => {
                warn!(error = %err, "workspace cleanup failed");
                Ok(())
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.created || self.suppressed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed abandoned workspace"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "abandoned workspace cleanup failed"),
        }
        deregister(&self.path);
    }
}

fn remove_dir(path: &Path, attempts: u32) -> Result<(), WorkspaceError> {
    let result = retry(attempts, || match std::fs::remove_dir_all(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    });
    match result {
        Ok(_) => Ok(()),
        Err(RetryError::Exhausted { attempts, source }) => Err(WorkspaceError::Cleanup {
            path: path.to_path_buf(),
            attempts,
            source,
        }),
        Err(RetryError::InvalidMaxAttempts(attempts)) => Err(WorkspaceError::Cleanup {
            path: path.to_path_buf(),
            attempts,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no cleanup attempt was made"),
        }),
    }
}

/// Turns an arbitrary name into a single, portable path segment.
fn sanitize_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed: String = out
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(MAX_SEGMENT_LEN)
        .collect();
    if trimmed.is_empty() {
        "workspace".to_string()
    } else {
        trimmed
    }
}

// ==================== Safety net ====================

static PENDING: OnceLock<Mutex<Vec<PathBuf>>> = OnceLock::new();
static INTERRUPT_HOOK: Once = Once::new();

fn pending() -> &'static Mutex<Vec<PathBuf>> {
    PENDING.get_or_init(|| Mutex::new(Vec::new()))
}

/// Records `path` for best-effort removal at shutdown. Installs the interrupt
/// hook on first use.
pub fn register_for_safety_cleanup(path: &Path) {
    INTERRUPT_HOOK.call_once(install_interrupt_hook);
    let mut pending = pending().lock().unwrap_or_else(PoisonError::into_inner);
    if !pending.iter().any(|p| p == path) {
        pending.push(path.to_path_buf());
    }
}

fn deregister(path: &Path) {
    let mut pending = pending().lock().unwrap_or_else(PoisonError::into_inner);
    pending.retain(|p| p != path);
}

/// Removes every registered workspace that was never cleaned up.
///
/// Returns the number of directories removed. Only call this once no scenario
/// is running, since in-flight workspaces are registered too.
pub fn run_safety_cleanup() -> usize {
    let paths = {
        let mut pending = pending().lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    };
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "safety cleanup failed"),
        }
    }
    removed
}

/// Workspaces currently awaiting safety cleanup.
pub fn pending_safety_cleanup() -> Vec<PathBuf> {
    pending()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn install_interrupt_hook() {
    let installed = ctrlc::set_handler(|| {
        let removed = run_safety_cleanup();
        debug!(removed, "interrupted, removed pending workspaces");
        std::process::exit(130);
    });
    if let Err(err) = installed {
        warn!(error = %err, "could not install workspace cleanup hook");
    }
}
