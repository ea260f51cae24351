// tests/common/mod.rs

//! Shared test utilities for integration tests.
//!
//! The external indexers are replaced by small shell scripts written into
//! the test's temp dir and wired in through `[tools]`, so the engines run
//! their normal subprocess code path.

#![allow(dead_code)]

use localrepo::LocalRepoConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Emits one stanza per `.deb` below the last argument, like
/// `dpkg-scanpackages` run on a pool.
pub const SCAN_PACKAGES: &str = r#"for last; do :; done
find "$last" -name '*.deb' | sort | while read -r f; do
  name=$(basename "$f" | cut -d_ -f1)
  printf 'Package: %s\nFilename: %s\n\n' "$name" "$f"
done
"#;

/// Source counterpart of [`SCAN_PACKAGES`], listing `.dsc` files.
pub const SCAN_SOURCES: &str = r#"for last; do :; done
find "$last" -name '*.dsc' | sort | while read -r f; do
  name=$(basename "$f" | cut -d_ -f1)
  printf 'Package: %s\nDirectory: %s\n\n' "$name" "$(dirname "$f")"
done
"#;

/// Creates `repodata/repomd.xml` listing the stored packages.
pub const CREATEREPO: &str = r#"for last; do :; done
mkdir -p "$last/repodata"
if [ -d "$last/Packages" ]; then
  find "$last/Packages" -name '*.rpm' | sort
fi > "$last/repodata/repomd.xml"
"#;

/// A scratch build farm: tools, repository base and artifact directories.
pub struct TestFarm {
    pub temp_dir: TempDir,
}

impl TestFarm {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("tools")).unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Repository base directory
    pub fn repo(&self) -> PathBuf {
        self.root().join("repo")
    }

    /// File every tool invocation appends to
    pub fn tool_log(&self) -> PathBuf {
        self.root().join("tools.log")
    }

    /// Lines of the tool log (empty if no tool ran)
    pub fn tool_log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.tool_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write an executable shell script into the tools directory.
    ///
    /// Every script first appends `enter <name> <args>` to the tool log and
    /// `exit <name>` once `body` succeeded.
    pub fn write_tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root().join("tools").join(name);
        let log = self.tool_log();
        let script = format!(
            "#!/bin/sh\nset -e\necho \"enter {name} $*\" >> '{log}'\n{body}\necho \"exit {name}\" >> '{log}'\n",
            name = name,
            log = log.display(),
            body = body,
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Configuration using the default fake tools
    pub fn config(&self) -> LocalRepoConfig {
        self.config_with(SCAN_PACKAGES, SCAN_SOURCES, CREATEREPO)
    }

    /// Configuration using fake tools with the given script bodies
    pub fn config_with(&self, packages: &str, sources: &str, createrepo: &str) -> LocalRepoConfig {
        let mut config = LocalRepoConfig::default();
        config.repository.base = self.repo();
        config.tools.dpkg_scanpackages = path_str(&self.write_tool("dpkg-scanpackages", packages));
        config.tools.dpkg_scansources = path_str(&self.write_tool("dpkg-scansources", sources));
        config.tools.createrepo = path_str(&self.write_tool("createrepo_c", createrepo));
        config
    }

    /// Create `<root>/<build>/<subdir>/<name>` with the name as content
    pub fn artifact(&self, build: &str, subdir: &str, name: &str) -> PathBuf {
        let dir = self.root().join(build).join(subdir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        path
    }

    /// Artifact directory of a build
    pub fn build_dir(&self, build: &str) -> PathBuf {
        self.root().join(build)
    }
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

/// Prefix a fake tool body with a delay, to widen race windows.
pub fn slow(body: &str) -> String {
    format!("sleep 0.3\n{}", body)
}

/// Names of all regular files below `dir`, relative to it, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    files.sort();
    files
}

/// Assert that `enter`/`exit` lines of the tool log never interleave.
pub fn assert_serialized(lines: &[String]) {
    let mut inside: Option<&str> = None;
    for line in lines {
        if let Some(rest) = line.strip_prefix("enter ") {
            assert!(inside.is_none(), "overlapping tool runs: {:?}", lines);
            inside = Some(rest);
        } else if line.starts_with("exit ") {
            assert!(inside.is_some(), "unbalanced tool log: {:?}", lines);
            inside = None;
        }
    }
    assert!(inside.is_none(), "tool run never finished: {:?}", lines);
}
