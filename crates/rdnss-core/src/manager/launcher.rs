// # Merge Hook Launcher
//
// The worker gives up root right after opening its packet source, and that
// changes the credentials of the whole process. The merge hook usually has
// to rewrite system resolver state, so it must not inherit them.
//
// The launcher is a small long-lived helper process, spawned while the daemon
// still has its startup credentials. Every request written to its stdin runs
// the hook once; the hook's exit code comes back on its stdout:
//
// ```text
// manager ──"run\n"──▶ helper (startup uid) ──fork/exec──▶ hook
//         ◀──"3\n"───
// ```
//
// The helper exits when its stdin closes, which happens when the launcher is
// dropped.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[cfg(unix)]
use std::process::Stdio;

#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
#[cfg(unix)]
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
#[cfg(unix)]
use tracing::debug;

/// Helper loop; `$0` is the hook path
#[cfg(unix)]
const HELPER_SCRIPT: &str = r#"while read -r request; do "$0" </dev/null >&2; echo "$?"; done"#;

/// Shell exit codes for "not executable" and "not found"
#[cfg(unix)]
const CANNOT_EXECUTE: [i32; 2] = [126, 127];

/// Runs the merge hook with the credentials the daemon was started with
#[cfg(unix)]
pub struct HookLauncher {
    hook: PathBuf,
    helper: Child,
    requests: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

#[cfg(unix)]
impl HookLauncher {
    /// Spawn the helper process for `hook`
    ///
    /// Must be called from within a Tokio runtime, and before privileges are
    /// dropped.
    ///
    /// # Errors
    ///
    /// `Error::Hook` if the helper cannot be started.
    pub fn spawn(hook: &Path) -> Result<Self> {
        let mut helper = Command::new("/bin/sh")
            .arg("-c")
            .arg(HELPER_SCRIPT)
            .arg(hook)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::hook(format!("cannot start launcher for {}: {}", hook.display(), e)))?;

        let (Some(requests), Some(replies)) = (helper.stdin.take(), helper.stdout.take()) else {
            return Err(Error::hook("launcher pipes are missing"));
        };

        debug!(
            "Merge hook launcher for {} started as pid {:?}",
            hook.display(),
            helper.id()
        );

        Ok(Self {
            hook: hook.to_path_buf(),
            helper,
            requests,
            replies: BufReader::new(replies).lines(),
        })
    }

    /// Process ID of the helper, while it is running
    pub fn helper_id(&self) -> Option<u32> {
        self.helper.id()
    }

    /// Run the hook once and wait for it
    ///
    /// # Returns
    ///
    /// The hook's exit code. A hook killed by a signal reports 128 plus the
    /// signal number.
    ///
    /// # Errors
    ///
    /// `Error::Hook` if the hook cannot be executed or the helper is gone.
    pub async fn run(&mut self) -> Result<i32> {
        self.requests
            .write_all(b"run\n")
            .await
            .map_err(|e| self.helper_gone(e))?;
        self.requests.flush().await.map_err(|e| self.helper_gone(e))?;

        let reply = self
            .replies
            .next_line()
            .await
            .map_err(|e| self.helper_gone(e))?
            .ok_or_else(|| self.helper_gone("no reply"))?;

        let code: i32 = reply.trim().parse().map_err(|_| {
            Error::hook(format!("unexpected launcher reply {:?}", reply))
        })?;

        if CANNOT_EXECUTE.contains(&code) {
            return Err(Error::hook(format!(
                "cannot run {}: exit status {}",
                self.hook.display(),
                code
            )));
        }
        Ok(code)
    }

    fn helper_gone(&self, reason: impl std::fmt::Display) -> Error {
        Error::hook(format!(
            "launcher for {} is gone: {}",
            self.hook.display(),
            reason
        ))
    }
}

/// Runs the merge hook directly; privileges are never dropped here
#[cfg(not(unix))]
pub struct HookLauncher {
    hook: PathBuf,
}

#[cfg(not(unix))]
impl HookLauncher {
    pub fn spawn(hook: &Path) -> Result<Self> {
        Ok(Self {
            hook: hook.to_path_buf(),
        })
    }

    pub fn helper_id(&self) -> Option<u32> {
        None
    }

    pub async fn run(&mut self) -> Result<i32> {
        let status = tokio::process::Command::new(&self.hook)
            .stdin(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| Error::hook(format!("cannot run {}: {}", self.hook.display(), e)))?;
        Ok(status.code().unwrap_or(-1))
    }
}

impl HookLauncher {
    /// Path of the hook
    pub fn hook(&self) -> &Path {
        &self.hook
    }
}
