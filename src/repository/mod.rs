// src/repository/mod.rs

//! Local package repositories
//!
//! This module provides:
//! - The on-disk layout of apt and RPM repositories
//! - An apt engine (pool copy, `Packages`/`Sources` and `Release` generation)
//! - An RPM engine (hard-linked archive, same-name replacement, repodata)
//! - Selection of the engine matching an operating system
//!
//! Both engines implement [`LocalRepository`]. The set of formats is closed;
//! [`RepositoryFormat::for_os`] is a fixed table, not a registry.

pub mod apt;
pub mod layout;
pub mod release;
pub mod rpm;

pub use apt::AptRepository;
pub use layout::{AptIndex, RepositoryLocation};
pub use rpm::RpmRepository;

use crate::config::LocalRepoConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Operating systems with a local repository engine
const OS_FORMATS: &[(&str, RepositoryFormat)] = &[
    ("debian", RepositoryFormat::Deb),
    ("ubuntu", RepositoryFormat::Deb),
    ("fedora", RepositoryFormat::Rpm),
    ("rhel", RepositoryFormat::Rpm),
];

/// Package format of a local repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryFormat {
    /// Debian-style apt repository
    Deb,
    /// yum/dnf repository
    Rpm,
}

impl RepositoryFormat {
    /// Format used for packages of `os_name`, if any
    ///
    /// # Examples
    /// ```
    /// use localrepo::RepositoryFormat;
    ///
    /// assert_eq!(RepositoryFormat::for_os("ubuntu"), Some(RepositoryFormat::Deb));
    /// assert_eq!(RepositoryFormat::for_os("rhel"), Some(RepositoryFormat::Rpm));
    /// assert_eq!(RepositoryFormat::for_os("gentoo"), None);
    /// ```
    pub fn for_os(os_name: &str) -> Option<Self> {
        OS_FORMATS
            .iter()
            .find(|(name, _)| *name == os_name)
            .map(|(_, format)| *format)
    }

    /// Operating systems served by this format
    pub fn os_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        OS_FORMATS
            .iter()
            .filter(move |(_, format)| format == self)
            .map(|(name, _)| *name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::Rpm => "rpm",
        }
    }

    /// URL installers use to reach the repository of `os_name` under `base_url`
    ///
    /// RPM URLs keep the `$releasever`/`$basearch` variables for dnf to expand.
    pub fn repository_url(&self, base_url: &str, os_name: &str) -> String {
        let base_url = base_url.trim_end_matches('/');
        match self {
            Self::Deb => format!("{}/{}", base_url, os_name),
            Self::Rpm => format!("{}/{}/$releasever/$basearch", base_url, os_name),
        }
    }

    /// Construct the engine for this format
    ///
    /// Fails with `ToolNotFound` if the format's indexer tools are missing.
    pub fn build(&self, config: &LocalRepoConfig) -> Result<RepositoryEngine> {
        Ok(match self {
            Self::Deb => RepositoryEngine::Apt(AptRepository::new(config)?),
            Self::Rpm => RepositoryEngine::Rpm(RpmRepository::new(config)?),
        })
    }
}

impl fmt::Display for RepositoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Select the repository format for `os_name`
pub fn select_format(os_name: &str) -> Option<RepositoryFormat> {
    RepositoryFormat::for_os(os_name)
}

/// Build the engine for `os_name`, or `None` if the OS has no engine
pub fn select_engine(os_name: &str, config: &LocalRepoConfig) -> Result<Option<RepositoryEngine>> {
    select_format(os_name)
        .map(|format| format.build(config))
        .transpose()
}

/// Operations every local repository engine supports
///
/// All operations are safe to call concurrently; writers of the same
/// directory are serialized internally.
#[async_trait]
pub trait LocalRepository: Send + Sync {
    /// Format handled by this engine
    fn format(&self) -> RepositoryFormat;

    /// Create empty, valid metadata for a target if it is missing
    ///
    /// Calling this again on an initialized target writes nothing.
    async fn initialize(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
    ) -> Result<()>;

    /// Import the source package found under `artifact_path`
    async fn import_source(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        artifact_path: &Path,
    ) -> Result<()>;

    /// Import the binary packages found under `artifact_path`
    async fn import_binary(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
        artifact_path: &Path,
    ) -> Result<()>;
}

/// A constructed engine of either format
pub enum RepositoryEngine {
    Apt(AptRepository),
    Rpm(RpmRepository),
}

impl RepositoryEngine {
    fn inner(&self) -> &dyn LocalRepository {
        match self {
            Self::Apt(repo) => repo,
            Self::Rpm(repo) => repo,
        }
    }
}

#[async_trait]
impl LocalRepository for RepositoryEngine {
    fn format(&self) -> RepositoryFormat {
        self.inner().format()
    }

    async fn initialize(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
    ) -> Result<()> {
        self.inner()
            .initialize(base_path, os_name, os_code_name, arch)
            .await
    }

    async fn import_source(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        self.inner()
            .import_source(base_path, os_name, os_code_name, artifact_path)
            .await
    }

    async fn import_binary(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        self.inner()
            .import_binary(base_path, os_name, os_code_name, arch, artifact_path)
            .await
    }
}

/// Files in `dir` matching `pattern`, sorted
///
/// A missing directory yields no files.
pub(crate) fn find_artifacts(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    let paths = glob::glob(&full)
        .map_err(|e| Error::IoError(format!("Invalid artifact pattern {}: {}", full, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            Error::io_context(format!("Failed to scan {}", e.path().display()), e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
