// src/importer.rs

//! Entry point for build orchestration
//!
//! A build farm issues `import_source`/`import_binary` steps for many
//! packages and targets at once. [`LocalImporter`] owns the repository base
//! and builds at most one engine per format. Every engine locks through
//! [`crate::lock::repository_locks`].

use crate::config::LocalRepoConfig;
use crate::error::{Error, Result};
use crate::repository::{LocalRepository, RepositoryEngine, RepositoryFormat};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One repository target of a build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub os_name: String,
    pub os_code_name: String,
    pub arch: String,
}

impl Target {
    pub fn new(os_name: &str, os_code_name: &str, arch: &str) -> Self {
        Self {
            os_name: os_name.to_string(),
            os_code_name: os_code_name.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.os_name, self.os_code_name, self.arch)
    }
}

/// Imports build artifacts into the local repositories under one base path
pub struct LocalImporter {
    config: LocalRepoConfig,
    base: PathBuf,
    engines: DashMap<RepositoryFormat, Arc<RepositoryEngine>>,
}

impl LocalImporter {
    /// Create an importer rooted at `config.repository.base`
    pub fn new(config: LocalRepoConfig) -> Self {
        let base = config.repository.base.clone();
        Self {
            config,
            base,
            engines: DashMap::new(),
        }
    }

    /// Repository base path
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Engine for `os_name`, constructed on first use
    ///
    /// Returns `None` for an OS without repository support. Fails with
    /// `ToolNotFound` if the engine's tools are missing.
    pub fn engine(&self, os_name: &str) -> Result<Option<Arc<RepositoryEngine>>> {
        let Some(format) = RepositoryFormat::for_os(os_name) else {
            return Ok(None);
        };

        let engine = match self.engines.entry(format) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let engine = Arc::new(format.build(&self.config)?);
                entry.insert(engine.clone());
                engine
            }
        };
        Ok(Some(engine))
    }

    /// Initialize the repositories of every target
    ///
    /// Stops at the first failure; an OS without an engine is an error here.
    pub async fn initialize_targets(&self, targets: &[Target]) -> Result<()> {
        for target in targets {
            let engine = self
                .engine(&target.os_name)?
                .ok_or_else(|| Error::UnsupportedOs(target.os_name.clone()))?;
            engine
                .initialize(
                    &self.base,
                    &target.os_name,
                    &target.os_code_name,
                    &target.arch,
                )
                .await?;
            info!("Initialized {} repository for {}", engine.format(), target);
        }
        Ok(())
    }

    /// Import the source artifacts of one build
    pub async fn import_source(
        &self,
        os_name: &str,
        os_code_name: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        let Some(engine) = self.engine(os_name)? else {
            warn!("No local repository support for {}; skipping source import", os_name);
            return Ok(());
        };
        engine
            .import_source(&self.base, os_name, os_code_name, artifact_path)
            .await
    }

    /// Import the binary artifacts of one build
    pub async fn import_binary(
        &self,
        os_name: &str,
        os_code_name: &str,
        arch: &str,
        artifact_path: &Path,
    ) -> Result<()> {
        let Some(engine) = self.engine(os_name)? else {
            warn!("No local repository support for {}; skipping binary import", os_name);
            return Ok(());
        };
        engine
            .import_binary(&self.base, os_name, os_code_name, arch, artifact_path)
            .await
    }
}
