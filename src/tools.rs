// src/tools.rs

//! External indexer tools
//!
//! Index metadata is produced by the distribution's own tooling
//! (`dpkg-scanpackages`, `dpkg-scansources`, `createrepo_c`). Tools are
//! resolved once when an engine is constructed, so a missing binary fails
//! fast instead of in the middle of an import.
//!
//! Invocations have no timeout and no retry; the exit status is the only
//! success signal.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// A resolved external command
#[derive(Debug, Clone)]
pub struct ExternalTool {
    /// Name used in log and error messages
    name: String,
    /// Absolute path of the executable
    program: PathBuf,
    /// Arguments placed before every invocation's own arguments
    leading_args: Vec<String>,
}

impl ExternalTool {
    /// Resolve `program` (a bare name searched on `PATH`, or a path)
    pub fn find(name: &str, program: &str) -> Result<Self> {
        Self::find_with_args(name, program, Vec::new())
    }

    /// Resolve `program` and prefix every invocation with `leading_args`
    pub fn find_with_args(name: &str, program: &str, leading_args: Vec<String>) -> Result<Self> {
        let resolved = which::which(program).map_err(|e| {
            Error::ToolNotFound(format!("{} ({}: {})", name, program, e))
        })?;
        debug!("Resolved {} to {:?}", name, resolved);

        Ok(Self {
            name: name.to_string(),
            program: resolved,
            leading_args,
        })
    }

    /// Get the tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the resolved executable path
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command<I, S>(&self, args: I, cwd: Option<&Path>) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).args(args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run the tool, discarding stdout and capturing stderr for diagnostics
    pub async fn run<I, S>(&self, args: I, cwd: Option<&Path>) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self
            .command(args, cwd)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::io_context(format!("Failed to run {}", self.name), e))?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                tool: self.name.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    /// Run the tool, forwarding its stdout byte-for-byte into `sink`
    ///
    /// A failing sink aborts the read loop but the process is still reaped
    /// before the error is returned.
    pub async fn stream_stdout<I, S, W>(&self, args: I, cwd: Option<&Path>, sink: &mut W) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
        W: Write,
    {
        let mut child = self
            .command(args, cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io_context(format!("Failed to run {}", self.name), e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::IoError(format!("{} stdout was not captured", self.name)))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::IoError(format!("{} stderr was not captured", self.name)))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        let mut copied = 0u64;
        let mut buffer = vec![0u8; 64 * 1024];
        let copy_result: Result<()> = async {
            loop {
                let n = stdout
                    .read(&mut buffer)
                    .await
                    .map_err(|e| Error::io_context(format!("Failed to read {} output", self.name), e))?;
                if n == 0 {
                    break;
                }
                sink.write_all(&buffer[..n])
                    .map_err(|e| Error::io_context(format!("Failed to write {} output", self.name), e))?;
                copied += n as u64;
            }
            Ok(())
        }
        .await;

        if copy_result.is_err() {
            let _ = child.start_kill();
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::io_context(format!("Failed to wait for {}", self.name), e))?;
        let stderr = stderr_task.await.unwrap_or_default();

        copy_result?;
        if !status.success() {
            return Err(Error::CommandFailed {
                tool: self.name.clone(),
                status,
                stderr,
            });
        }

        debug!("{} produced {} bytes", self.name, copied);
        Ok(())
    }
}
