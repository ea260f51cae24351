// src/repository/rpm.rs

//! RPM (yum/dnf) local repository
//!
//! Each OS codename has three independent repositories:
//!
//! - `SRPMS/` for source packages
//! - `<arch>/` for binary packages
//! - `<arch>/debug/` for `-debuginfo` and `-debugsource` packages
//!
//! Each directory has its own lock, so source, binary and debug imports of
//! the same OS never contend unless they target the same directory.
//!
//! Importing a package removes every stored package sharing its base name
//! before the new file is hard-linked in. Versions are not compared: the
//! latest import always wins, even if it is an older build.

use crate::config::LocalRepoConfig;
use crate::error::{Error, Result};
use crate::identity::{RpmIdentity, file_name, pool_prefix};
use crate::lock::{RepositoryLockManager, repository_locks};
use crate::repository::layout::RepositoryLocation;
use crate::repository::{LocalRepository, RepositoryFormat, find_artifacts};
use crate::tools::ExternalTool;
use async_trait::async_trait;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Artifact subdirectory holding the source RPM
pub const SOURCE_ARTIFACT_DIR: &str = "sourcepkg";
/// Artifact subdirectory holding binary (and debug) RPMs
pub const BINARY_ARTIFACT_DIR: &str = "binarypkg";

/// Directory under each repository holding the package files
const PACKAGES_DIR: &str = "Packages";
/// Directory under each repository holding the metadata
const REPODATA_DIR: &str = "repodata";

const CREATEREPO_FLAGS: [&str; 3] = ["--quiet", "--no-database", "--general-compress-type=gz"];

/// Binary RPMs of one build, split by destination
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BinaryPartition {
    /// Source RPMs found among the binaries; never imported
    pub src: Vec<PathBuf>,
    /// Debug symbol and debug source packages
    pub debug: Vec<PathBuf>,
    /// Everything else
    pub arch: Vec<PathBuf>,
}

impl BinaryPartition {
    /// Split RPM files by filename into disjoint source/debug/arch sets
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        let mut partition = Self::default();
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.ends_with(".src.rpm") {
                partition.src.push(file);
            } else if is_debug_package(&name) {
                partition.debug.push(file);
            } else {
                partition.arch.push(file);
            }
        }
        partition
    }
}

/// Whether a filename matches `*-debuginfo-*` or `*-debugsource-*`
fn is_debug_package(filename: &str) -> bool {
    filename.contains("-debuginfo-") || filename.contains("-debugsource-")
}

/// Local RPM repository engine
pub struct RpmRepository {
    createrepo: ExternalTool,
    locks: &'static RepositoryLockManager,
}

impl RpmRepository {
    /// Create the engine, resolving the createrepo indexer
    pub fn new(config: &LocalRepoConfig) -> Result<Self> {
        Ok(Self {
            createrepo: ExternalTool::find_with_args(
                "createrepo_c",
                &config.tools.createrepo,
                config.tools.createrepo_args.clone(),
            )?,
            locks: repository_locks(),
        })
    }

    /// Import `rpms` into `repo_dir` under that directory's lock
    pub async fn import_to(&self, repo_dir: &Path, rpms: &[PathBuf]) -> Result<()> {
        create_dir(repo_dir)?;
        let _lock = self.locks.acquire(repo_dir).await;
        self.import_to_locked(repo_dir, rpms).await
    }

    async fn import_to_locked(&self, repo_dir: &Path, rpms: &[PathBuf]) -> Result<()> {
        debug!(
            "Importing the following RPMs into {:?}: {}",
            repo_dir,
            rpms.iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut accepted = Vec::with_capacity(rpms.len());
        for rpm in rpms {
            match RpmIdentity::from_path(rpm) {
                Ok(identity) => accepted.push((rpm, identity)),
                Err(e) => warn!("Skipping {:?}: {}", rpm, e),
            }
        }
        if accepted.is_empty() {
            warn!("No importable RPMs for {:?}", repo_dir);
            return Ok(());
        }

        let names: HashSet<&str> = accepted.iter().map(|(_, id)| id.name.as_str()).collect();
        let removed = remove_superseded(repo_dir, &names)?;
        if !removed.is_empty() {
            info!(
                "Removed {} superseded package(s) from {:?}",
                removed.len(),
                repo_dir
            );
        }

        for (rpm, _) in &accepted {
            link_into_repo(repo_dir, rpm)?;
        }

        self.update_metadata(repo_dir).await?;
        info!("Imported {} RPM(s) into {:?}", accepted.len(), repo_dir);
        Ok(())
    }

    /// Incrementally refresh the repodata of `repo_dir`
    async fn update_metadata(&self, repo_dir: &Path) -> Result<()> {
        let mut args: Vec<&OsStr> = CREATEREPO_FLAGS.into_iter().map(OsStr::new).collect();
        args.push(OsStr::new("--update"));
        args.push(repo_dir.as_os_str());
        self.createrepo.run(args, None).await
    }

    /// Create empty, valid repodata in `repo_dir` unless it already has some
    ///
    /// Returns whether the directory was initialized.
    async fn initialize_dir(&self, repo_dir: &Path) -> Result<bool> {
        if has_repodata(repo_dir) {
            return Ok(false);
        }
        create_dir(repo_dir)?;

        let _lock = self.locks.acquire(repo_dir).await;
        if has_repodata(repo_dir) {
            return Ok(false);
        }

        info!("Initializing RPM metadata in {:?}", repo_dir);
        let mut args: Vec<&OsStr> = CREATEREPO_FLAGS.into_iter().map(OsStr::new).collect();
        args.push(repo_dir.as_os_str());
        self.createrepo.run(args, None).await?;
        Ok(true)
    }
}

#[async_trait]
impl LocalRepository for RpmRepository {
    fn format(&self) -> RepositoryFormat {
        RepositoryFormat::Rpm
    }

    async fn initialize(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
    ) -> Result<()> {
        let location = RepositoryLocation::new(base_path, os_name, os_code_name);
        let arch_dir = location.arch_dir(arch);
        let debug_dir = location.debug_dir(arch);

        for repo_dir in [location.srpms_dir(), arch_dir, debug_dir] {
            self.initialize_dir(&repo_dir).await?;
        }
        Ok(())
    }

    async fn import_source(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        let location = RepositoryLocation::new(base_path, os_name, os_code_name);
        let srpms = find_artifacts(&artifact_path.join(SOURCE_ARTIFACT_DIR), "*.src.rpm")?;

        if srpms.len() != 1 {
            warn!(
                "Found unexpected number of source RPMs in {:?} ({})",
                artifact_path,
                srpms.len()
            );
        }
        if srpms.is_empty() {
            return Ok(());
        }

        self.import_to(&location.srpms_dir(), &srpms).await
    }

    async fn import_binary(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        let location = RepositoryLocation::new(base_path, os_name, os_code_name);
        let arch_dir = location.arch_dir(arch);
        let debug_dir = location.debug_dir(arch);

        let rpms = find_artifacts(&artifact_path.join(BINARY_ARTIFACT_DIR), "*.rpm")?;
        let partition = BinaryPartition::from_files(rpms);
        if !partition.src.is_empty() {
            debug!(
                "Ignoring {} source RPM(s) among binaries in {:?}",
                partition.src.len(),
                artifact_path
            );
        }

        if partition.arch.is_empty() {
            warn!("Found no arch RPMs to import from {:?}", artifact_path);
        } else {
            self.import_to(&arch_dir, &partition.arch).await?;
        }

        if !partition.debug.is_empty() {
            self.import_to(&debug_dir, &partition.debug).await?;
        }
        Ok(())
    }
}

fn has_repodata(repo_dir: &Path) -> bool {
    repo_dir.join(REPODATA_DIR).join("repomd.xml").is_file()
}

/// Delete every stored RPM in `repo_dir` whose base name is in `names`
///
/// Nested repositories (like `<arch>/debug`) have their own lock and are
/// not descended into.
fn remove_superseded(repo_dir: &Path, names: &HashSet<&str>) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let walker = WalkDir::new(repo_dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || (entry.file_name() != REPODATA_DIR && !has_repodata(entry.path()))
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::IoError(format!("Failed to scan {}: {}", repo_dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            continue;
        };
        if !filename.ends_with(".rpm") {
            continue;
        }
        let Ok(identity) = RpmIdentity::parse(filename) else {
            continue;
        };
        if names.contains(identity.name.as_str()) {
            fs::remove_file(entry.path()).map_err(|e| {
                Error::io_context(format!("Failed to remove {}", entry.path().display()), e)
            })?;
            debug!("Removed superseded {:?}", entry.path());
            removed.push(entry.path().to_path_buf());
        }
    }
    Ok(removed)
}

/// Hard-link `rpm` to `<repo>/Packages/<c>/<filename>`
fn link_into_repo(repo_dir: &Path, rpm: &Path) -> Result<PathBuf> {
    let filename = file_name(rpm)?;
    let dest = repo_dir.join(PACKAGES_DIR).join(pool_prefix(filename, filename));
    if let Some(parent) = dest.parent() {
        create_dir(parent)?;
    }
    fs::hard_link(rpm, &dest).map_err(|e| {
        Error::io_context(
            format!("Failed to link {} to {}", rpm.display(), dest.display()),
            e,
        )
    })?;
    debug!("Linked {:?} to {:?}", rpm, dest);
    Ok(dest)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::io_context(format!("Failed to create {}", path.display()), e))
}
