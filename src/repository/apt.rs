// src/repository/apt.rs

//! Debian-style (apt) local repository
//!
//! Packages are copied into a shared pool per OS and the `Sources` /
//! `Packages` indices of the touched suite are regenerated from the whole
//! pool after every import, followed by the suite's `Release` file.
//!
//! All writers of one OS share a single lock on `<base>/<os>`: the pool is
//! common to every codename and architecture of that OS.

use crate::compression::{CompressionFormat, IndexFileWriter, gzip_file};
use crate::config::{LocalRepoConfig, ReleaseSection};
use crate::error::{Error, Result};
use crate::identity::{DebIdentity, file_name};
use crate::lock::{RepositoryLockManager, repository_locks};
use crate::repository::layout::{AptIndex, RepositoryLocation};
use crate::repository::{LocalRepository, RepositoryFormat, find_artifacts, release};
use crate::tools::ExternalTool;
use async_trait::async_trait;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Artifact subdirectory holding source package files
pub const SOURCE_ARTIFACT_DIR: &str = "sourcedeb";
/// Artifact subdirectory holding binary package files
pub const BINARY_ARTIFACT_DIR: &str = "binarydeb";

/// Files making up one Debian source package
const SOURCE_PATTERNS: [&str; 3] = ["*.dsc", "*.orig.tar.gz", "*.debian.tar.xz"];
const BINARY_PATTERN: &str = "*.deb";

/// Pool directory argument handed to the scanners, relative to the OS dir
const POOL_ARG: &str = "pool/";

/// Local apt repository engine
pub struct AptRepository {
    scanpackages: ExternalTool,
    scansources: ExternalTool,
    release: ReleaseSection,
    locks: &'static RepositoryLockManager,
}

impl AptRepository {
    /// Create the engine, resolving the dpkg scanners
    ///
    /// Fails with `ToolNotFound` if either scanner is missing.
    pub fn new(config: &LocalRepoConfig) -> Result<Self> {
        Ok(Self {
            scanpackages: ExternalTool::find("dpkg-scanpackages", &config.tools.dpkg_scanpackages)?,
            scansources: ExternalTool::find("dpkg-scansources", &config.tools.dpkg_scansources)?,
            release: config.release.clone(),
            locks: repository_locks(),
        })
    }

    /// Create placeholder indices and a Release file if any are missing
    ///
    /// Returns whether anything was written.
    fn initialize_locked(&self, location: &RepositoryLocation, arch: &str) -> Result<bool> {
        let mut force_update = false;

        for index in [AptIndex::Source, AptIndex::Binary(arch.to_string())] {
            let index_file = location.index_file(&index);
            if !index_file.is_file() {
                if let Some(parent) = index_file.parent() {
                    create_dir(parent)?;
                }
                File::create(&index_file).map_err(|e| {
                    Error::io_context(format!("Failed to create {}", index_file.display()), e)
                })?;
                force_update = true;
            }

            let gz_file = CompressionFormat::Gzip.twin_path(&index_file);
            if !gz_file.is_file() {
                gzip_file(&index_file, &gz_file).map_err(|e| {
                    Error::io_context(format!("Failed to create {}", gz_file.display()), e)
                })?;
                force_update = true;
            }
        }

        if force_update || !location.release_file().is_file() {
            release::write_release(&location.dist_dir(), &location.os_code_name, &self.release)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Regenerate one index (plain + gz) from the full pool, then Release
    async fn update_metadata(&self, location: &RepositoryLocation, index: AptIndex) -> Result<()> {
        let os_dir = location.os_dir();
        let index_file = location.index_file(&index);
        if let Some(parent) = index_file.parent() {
            create_dir(parent)?;
        }

        let (scanner, args): (&ExternalTool, Vec<&str>) = match &index {
            AptIndex::Source => (&self.scansources, vec![POOL_ARG]),
            AptIndex::Binary(arch) => (&self.scanpackages, vec!["--arch", arch.as_str(), POOL_ARG]),
        };

        let mut writer = IndexFileWriter::create(&index_file).map_err(|e| {
            Error::io_context(format!("Failed to open {}", index_file.display()), e)
        })?;
        scanner.stream_stdout(args, Some(&os_dir), &mut writer).await?;
        writer.commit().map_err(|e| {
            Error::io_context(format!("Failed to write {}", index_file.display()), e)
        })?;
        debug!("Regenerated {:?}", index_file);

        release::write_release(&location.dist_dir(), &location.os_code_name, &self.release)
    }
}

#[async_trait]
impl LocalRepository for AptRepository {
    fn format(&self) -> RepositoryFormat {
        RepositoryFormat::Deb
    }

    async fn initialize(
        &self,
        base_path: &Path,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
    ) -> Result<()> {
        let location = RepositoryLocation::new(base_path, os_name, os_code_name);
        let os_dir = location.os_dir();
        create_dir(&os_dir)?;

        let _lock = self.locks.acquire(&os_dir).await;
        if self.initialize_locked(&location, arch)? {
            info!("Initialized apt metadata in {:?}", location.dist_dir());
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
        let os_dir = location.os_dir();
        create_dir(&os_dir)?;

        let source_dir = artifact_path.join(SOURCE_ARTIFACT_DIR);
        let mut files = Vec::new();
        for pattern in SOURCE_PATTERNS {
            files.extend(find_artifacts(&source_dir, pattern)?);
        }

        let _lock = self.locks.acquire(&os_dir).await;
        let placed = copy_to_pool(&location.pool_dir(), &files)?;
        info!(
            "Imported {} source file(s) into {:?}",
            placed.len(),
            location.pool_dir()
        );
        self.update_metadata(&location, AptIndex::Source).await
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
        let os_dir = location.os_dir();
        create_dir(&os_dir)?;

        let files = find_artifacts(&artifact_path.join(BINARY_ARTIFACT_DIR), BINARY_PATTERN)?;

        let _lock = self.locks.acquire(&os_dir).await;
        let placed = copy_to_pool(&location.pool_dir(), &files)?;
        info!(
            "Imported {} binary package(s) into {:?}",
            placed.len(),
            location.pool_dir()
        );
        self.update_metadata(&location, AptIndex::Binary(arch.to_string()))
            .await
    }
}

/// Copy artifacts into `pool/<c>/<name>/`
///
/// Every filename is validated before anything is copied; a file without a
/// `_` fails the whole batch. Existing files at the destination are
/// overwritten.
pub fn copy_to_pool(pool_dir: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut planned = Vec::with_capacity(files.len());
    for file in files {
        let name = file_name(file)?;
        let identity = DebIdentity::parse(name)?;
        planned.push((file, pool_dir.join(identity.pool_subdir()), name, identity));
    }

    let mut placed = Vec::with_capacity(planned.len());
    for (src, subdir, name, identity) in planned {
        create_dir(&subdir)?;
        let dest = subdir.join(name);
        fs::copy(src, &dest).map_err(|e| {
            Error::io_context(
                format!("Failed to copy {} to {}", src.display(), dest.display()),
                e,
            )
        })?;
        debug!(
            "Copied {} {} ({}) to {:?}",
            identity.name,
            identity.version.as_deref().unwrap_or("-"),
            identity.arch.as_deref().unwrap_or("source"),
            dest
        );
        placed.push(dest);
    }
    Ok(placed)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::io_context(format!("Failed to create {}", path.display()), e))
}
