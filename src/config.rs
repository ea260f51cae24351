// src/config.rs
//! Configuration file parsing for local repositories
//!
//! Supports TOML configuration files with the following sections:
//! - [repository] - Base directory of all local repositories
//! - [release] - Header values of generated apt `Release` files
//! - [tools] - External indexer programs
//!
//! Every key is optional; an empty file yields the defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalRepoConfig {
    /// Repository location settings
    #[serde(default)]
    pub repository: RepositorySection,

    /// apt Release header settings
    #[serde(default)]
    pub release: ReleaseSection,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsSection,
}

impl LocalRepoConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Repository location section
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySection {
    /// Base path under which `<os>/...` trees are created
    #[serde(default = "default_base")]
    pub base: PathBuf,
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            base: default_base(),
        }
    }
}

fn default_base() -> PathBuf {
    PathBuf::from("repo")
}

/// apt Release header section
///
/// `label` and `description` may contain `{codename}`, replaced by the
/// suite being written.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSection {
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Value of the `Architectures` header
    #[serde(default = "default_architectures")]
    pub architectures: Vec<String>,
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            label: default_label(),
            description: default_description(),
            architectures: default_architectures(),
        }
    }
}

impl ReleaseSection {
    /// Label for a given codename
    pub fn label_for(&self, codename: &str) -> String {
        self.label.replace("{codename}", codename)
    }

    /// Description for a given codename
    pub fn description_for(&self, codename: &str) -> String {
        self.description.replace("{codename}", codename)
    }
}

fn default_origin() -> String {
    "ROS".to_string()
}

fn default_label() -> String {
    "ROS {codename}".to_string()
}

fn default_description() -> String {
    "ROS {codename} Debian Repository".to_string()
}

fn default_architectures() -> Vec<String> {
    vec!["amd64".to_string()]
}

/// External tool section
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_scanpackages")]
    pub dpkg_scanpackages: String,

    #[serde(default = "default_scansources")]
    pub dpkg_scansources: String,

    #[serde(default = "default_createrepo")]
    pub createrepo: String,

    /// Arguments placed before createrepo's own arguments
    #[serde(default)]
    pub createrepo_args: Vec<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            dpkg_scanpackages: default_scanpackages(),
            dpkg_scansources: default_scansources(),
            createrepo: default_createrepo(),
            createrepo_args: Vec::new(),
        }
    }
}

fn default_scanpackages() -> String {
    "dpkg-scanpackages".to_string()
}

fn default_scansources() -> String {
    "dpkg-scansources".to_string()
}

fn default_createrepo() -> String {
    "createrepo_c".to_string()
}
