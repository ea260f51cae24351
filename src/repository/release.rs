// src/repository/release.rs

//! apt `Release` descriptor generation
//!
//! The Release file is always rewritten in full from the index files
//! currently on disk:
//!
//! ```text
//! Origin: ROS
//! Label: ROS noble
//! Suite: noble
//! Codename: noble
//! Date: Thu, 01 Feb 2024 12:00:00 UTC
//! Architectures: amd64
//! Components: main
//! Description: ROS noble Debian Repository
//! MD5Sum:
//!  <hex> <size> main/binary-amd64/Packages
//!  ...
//! SHA1:
//!  ...
//! SHA256:
//!  ...
//! ```
//!
//! The new content goes to a temporary file in the codename directory that
//! is renamed over `Release`, so readers never see a truncated descriptor.

use crate::compression::make_world_readable;
use crate::config::ReleaseSection;
use crate::error::{Error, Result};
use crate::hash::{FileDigests, HashAlgorithm};
use crate::repository::layout::{APT_COMPONENT, relative_display};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Format of the `Date` header
const RELEASE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Find every `Packages*` and `Sources*` index below `dist_dir`, sorted
pub fn index_files(dist_dir: &Path) -> Result<Vec<PathBuf>> {
    let component_dir = dist_dir.join(APT_COMPONENT);
    let escaped = glob::Pattern::escape(&component_dir.to_string_lossy());

    let mut files = Vec::new();
    for pattern in [
        format!("{}/*/Packages*", escaped),
        format!("{}/source/Sources*", escaped),
    ] {
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::IoError(format!("Invalid index pattern {}: {}", pattern, e)))?;
        for entry in paths {
            let path = entry.map_err(|e| {
                Error::io_context(format!("Failed to scan {}", e.path().display()), e.into_error())
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Render the complete Release descriptor for `dist_dir`
pub fn render(
    dist_dir: &Path,
    codename: &str,
    config: &ReleaseSection,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut entries = Vec::new();
    for path in index_files(dist_dir)? {
        let digests = FileDigests::from_file(&path)
            .map_err(|e| Error::io_context(format!("Failed to digest {}", path.display()), e))?;
        entries.push((relative_display(&path, dist_dir), digests));
    }

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "Origin: {}", config.origin);
    let _ = writeln!(out, "Label: {}", config.label_for(codename));
    let _ = writeln!(out, "Suite: {}", codename);
    let _ = writeln!(out, "Codename: {}", codename);
    let _ = writeln!(out, "Date: {}", now.format(RELEASE_DATE_FORMAT));
    let _ = writeln!(out, "Architectures: {}", config.architectures.join(" "));
    let _ = writeln!(out, "Components: {}", APT_COMPONENT);
    let _ = writeln!(out, "Description: {}", config.description_for(codename));

    for algorithm in HashAlgorithm::RELEASE_ORDER {
        let _ = writeln!(out, "{}:", algorithm.release_field());
        for (relative, digests) in &entries {
            let _ = writeln!(
                out,
                " {} {} {}",
                digests.get(algorithm),
                digests.size,
                relative
            );
        }
    }

    Ok(out)
}

/// Regenerate `<dist_dir>/Release` atomically
pub fn write_release(dist_dir: &Path, codename: &str, config: &ReleaseSection) -> Result<()> {
    let content = render(dist_dir, codename, config, Utc::now())?;
    let target = dist_dir.join("Release");

    let mut tmp = NamedTempFile::new_in(dist_dir)
        .map_err(|e| Error::io_context(format!("Failed to create temp file in {}", dist_dir.display()), e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| make_world_readable(tmp.as_file()))
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::io_context(format!("Failed to write {}", target.display()), e))?;
    tmp.persist(&target)
        .map_err(|e| Error::io_context(format!("Failed to replace {}", target.display()), e.error))?;

    debug!("Wrote {:?}", target);
    Ok(())
}
