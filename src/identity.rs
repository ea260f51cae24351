// src/identity.rs

//! Package identity derived from artifact filenames
//!
//! Repository engines never open package files; they trust the naming
//! conventions of the build step that produced them:
//!
//! - **deb**: `<name>_<version>[_<arch>].<ext>`. Only the name (everything
//!   before the first `_`) is required; it selects the pool directory.
//! - **rpm**: `<name>-<version>-<release>.<arch>.rpm`, where `version` is a
//!   dot-separated run of digits and `release` starts with a digit. The
//!   name may itself contain dashes and dots.
//!
//! Names that do not follow the convention are rejected rather than guessed.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static RPM_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)-(\d+(?:\.\d+)*)-(\d+.*)\.([^.]+)\.rpm$").expect("valid rpm filename regex")
});

/// Identity of a Debian package artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebIdentity {
    pub name: String,
    pub version: Option<String>,
    pub arch: Option<String>,
}

impl DebIdentity {
    /// Parse a `.deb`, `.dsc` or source tarball filename
    pub fn parse(filename: &str) -> Result<Self> {
        let (name, rest) = filename
            .split_once('_')
            .ok_or_else(|| Error::FilenameParse(filename.to_string()))?;
        if name.is_empty() {
            return Err(Error::FilenameParse(filename.to_string()));
        }

        let mut fields = rest.splitn(2, '_');
        let version = fields
            .next()
            .map(strip_artifact_suffix)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let arch = fields
            .next()
            .map(strip_artifact_suffix)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            version,
            arch,
        })
    }

    /// Pool subdirectory for this package: `<first-char>/<name>`
    pub fn pool_subdir(&self) -> String {
        pool_prefix(&self.name, &self.name)
    }
}

/// Identity of an RPM package artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmIdentity {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl RpmIdentity {
    /// Parse a `name-version-release.arch.rpm` filename
    pub fn parse(filename: &str) -> Result<Self> {
        let caps = RPM_FILENAME
            .captures(filename)
            .ok_or_else(|| Error::FilenameParse(filename.to_string()))?;

        Ok(Self {
            name: caps[1].to_string(),
            version: caps[2].to_string(),
            release: caps[3].to_string(),
            arch: caps[4].to_string(),
        })
    }

    /// Parse the final component of a path
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = file_name(path)?;
        Self::parse(filename)
    }

    /// Whether this is a source package (`.src.rpm`)
    pub fn is_source(&self) -> bool {
        self.arch == "src"
    }
}

impl fmt::Display for RpmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }
}

/// Get the UTF-8 filename of a path
pub fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::FilenameParse(path.display().to_string()))
}

/// `<first-char-of-key>/<leaf>`
pub(crate) fn pool_prefix(key: &str, leaf: &str) -> String {
    let first: String = key.chars().take(1).collect();
    format!("{}/{}", first, leaf)
}

fn strip_artifact_suffix(field: &str) -> &str {
    for suffix in [".orig.tar.gz", ".debian.tar.xz", ".dsc", ".deb"] {
        if let Some(stripped) = field.strip_suffix(suffix) {
            return stripped;
        }
    }
    field
}
