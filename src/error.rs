// src/error.rs

//! Error types for repository import operations

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the repository engines
#[derive(Error, Debug)]
pub enum Error {
    /// A required external indexer binary could not be found
    #[error("required tool not found: {0}")]
    ToolNotFound(String),

    /// An external scanner or indexer exited unsuccessfully
    #[error("{tool} failed ({status}){}", format_stderr(.stderr))]
    CommandFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// An artifact filename does not follow the expected naming pattern
    #[error("failed to parse package filename: {0}")]
    FilenameParse(String),

    /// Filesystem operation failed with added context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// No repository engine supports the requested operating system
    #[error("no local repository support for {0}")]
    UnsupportedOs(String),
}

impl Error {
    /// Wrap an I/O error with a message describing what was being done
    pub fn io_context(context: impl std::fmt::Display, err: io::Error) -> Self {
        Self::IoError(format!("{}: {}", context, err))
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
