// src/repository/layout.rs

//! On-disk layout of local repositories
//!
//! ```text
//! <base>/<os>/pool/<c>/<name>/<file>                     (apt)
//! <base>/<os>/dists/<codename>/Release
//! <base>/<os>/dists/<codename>/main/source/Sources[.gz]
//! <base>/<os>/dists/<codename>/main/binary-<arch>/Packages[.gz]
//!
//! <base>/<os>/<codename>/SRPMS/{Packages,repodata}       (rpm)
//! <base>/<os>/<codename>/<arch>/{Packages,repodata}
//! <base>/<os>/<codename>/<arch>/debug/{Packages,repodata}
//! ```

use std::path::{Path, PathBuf};

/// Name of the single apt component every package is published in
pub const APT_COMPONENT: &str = "main";

/// A repository target: base path plus OS and codename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocation {
    pub base: PathBuf,
    pub os_name: String,
    pub os_code_name: String,
}

impl RepositoryLocation {
    pub fn new(base: impl Into<PathBuf>, os_name: &str, os_code_name: &str) -> Self {
        Self {
            base: base.into(),
            os_name: os_name.to_string(),
            os_code_name: os_code_name.to_string(),
        }
    }

    /// `<base>/<os>`
    pub fn os_dir(&self) -> PathBuf {
        self.base.join(&self.os_name)
    }

    // -- apt ------------------------------------------------------------

    /// `<base>/<os>/pool`
    pub fn pool_dir(&self) -> PathBuf {
        self.os_dir().join("pool")
    }

    /// `<base>/<os>/dists/<codename>`
    pub fn dist_dir(&self) -> PathBuf {
        self.os_dir().join("dists").join(&self.os_code_name)
    }

    /// `<dist>/Release`
    pub fn release_file(&self) -> PathBuf {
        self.dist_dir().join("Release")
    }

    /// Plain index file of an apt component
    pub fn index_file(&self, component: &AptIndex) -> PathBuf {
        self.dist_dir()
            .join(APT_COMPONENT)
            .join(component.dir_name())
            .join(component.file_name())
    }

    // -- rpm ------------------------------------------------------------

    /// `<base>/<os>/<codename>`
    pub fn rpm_root(&self) -> PathBuf {
        self.os_dir().join(&self.os_code_name)
    }

    /// `<base>/<os>/<codename>/SRPMS`
    pub fn srpms_dir(&self) -> PathBuf {
        self.rpm_root().join("SRPMS")
    }

    /// `<base>/<os>/<codename>/<arch>`
    pub fn arch_dir(&self, arch: &str) -> PathBuf {
        self.rpm_root().join(arch)
    }

    /// `<base>/<os>/<codename>/<arch>/debug`
    pub fn debug_dir(&self, arch: &str) -> PathBuf {
        self.arch_dir(arch).join("debug")
    }
}

/// One apt index: the source index or the binary index of an arch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AptIndex {
    Source,
    Binary(String),
}

impl AptIndex {
    /// Index for an optional architecture (`None` means source)
    pub fn for_arch(arch: Option<&str>) -> Self {
        match arch {
            Some(arch) => Self::Binary(arch.to_string()),
            None => Self::Source,
        }
    }

    /// Directory under `main/`
    pub fn dir_name(&self) -> String {
        match self {
            Self::Source => "source".to_string(),
            Self::Binary(arch) => format!("binary-{}", arch),
        }
    }

    /// Name of the plain index file
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Source => "Sources",
            Self::Binary(_) => "Packages",
        }
    }
}

/// Path of `path` relative to `base`, with `/` separators
pub fn relative_display(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
