// tests/apt_import.rs

//! Integration tests for the apt repository engine.

#![cfg(unix)]

mod common;

use common::{SCAN_PACKAGES, SCAN_SOURCES, TestFarm, assert_serialized, list_files, slow};
use localrepo::compression::read_to_end;
use localrepo::hash::FileDigests;
use localrepo::repository::{AptIndex, AptRepository};
use localrepo::{Error, LocalRepository, RepositoryLocation};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

const DEB: &str = "ros-noble-foo_1.0.0-1noble_amd64.deb";

/// Path, inode and mtime of every file below `dir`
fn snapshot(dir: &Path) -> Vec<(String, u64, i64, i64)> {
    list_files(dir)
        .into_iter()
        .map(|rel| {
            let meta = fs::metadata(dir.join(&rel)).unwrap();
            (rel, meta.ino(), meta.mtime(), meta.mtime_nsec())
        })
        .collect()
}

fn count_stanzas(index: &str, package: &str) -> usize {
    index
        .lines()
        .filter(|line| *line == format!("Package: {}", package))
        .count()
}

#[tokio::test]
async fn test_initialize_creates_empty_metadata() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();

    repo.initialize(&farm.repo(), "ubuntu", "noble", "amd64")
        .await
        .unwrap();

    let dist = farm.repo().join("ubuntu/dists/noble");
    assert_eq!(
        list_files(&dist),
        [
            "Release",
            "main/binary-amd64/Packages",
            "main/binary-amd64/Packages.gz",
            "main/source/Sources",
            "main/source/Sources.gz",
        ]
    );
    assert!(read_to_end(&dist.join("main/source/Sources.gz")).unwrap().is_empty());

    let release = fs::read_to_string(dist.join("Release")).unwrap();
    assert!(release.starts_with("Origin: ROS\nLabel: ROS noble\nSuite: noble\nCodename: noble\nDate: "));
    assert_eq!(release.matches(" main/binary-amd64/Packages.gz\n").count(), 3);

    // No scanner is needed for an empty repository
    assert!(farm.tool_log_lines().is_empty());
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    let dist = farm.repo().join("ubuntu/dists/noble");

    repo.initialize(&farm.repo(), "ubuntu", "noble", "amd64")
        .await
        .unwrap();
    let before = snapshot(&dist);

    repo.initialize(&farm.repo(), "ubuntu", "noble", "amd64")
        .await
        .unwrap();
    assert_eq!(snapshot(&dist), before);
}

#[tokio::test]
async fn test_initialize_new_arch_keeps_existing_indices() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    let dist = farm.repo().join("ubuntu/dists/noble");

    repo.initialize(&farm.repo(), "ubuntu", "noble", "amd64")
        .await
        .unwrap();
    let amd64 = fs::metadata(dist.join("main/binary-amd64/Packages")).unwrap().ino();

    repo.initialize(&farm.repo(), "ubuntu", "noble", "arm64")
        .await
        .unwrap();

    assert_eq!(fs::metadata(dist.join("main/binary-amd64/Packages")).unwrap().ino(), amd64);
    let release = fs::read_to_string(dist.join("Release")).unwrap();
    assert!(release.contains(" main/binary-arm64/Packages\n"));
    assert!(release.contains(" main/binary-amd64/Packages\n"));
}

#[tokio::test]
async fn test_import_binary_twice_lists_package_once() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("build", "binarydeb", DEB);

    for _ in 0..2 {
        repo.import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("build"))
            .await
            .unwrap();
    }

    let pool = farm.repo().join("ubuntu/pool");
    assert_eq!(list_files(&pool), [format!("r/ros-noble-foo/{}", DEB)]);

    let packages_path = RepositoryLocation::new(farm.repo(), "ubuntu", "noble")
        .index_file(&AptIndex::Binary("amd64".to_string()));
    let packages = fs::read_to_string(&packages_path).unwrap();
    assert_eq!(count_stanzas(&packages, "ros-noble-foo"), 1);
    assert!(packages.contains(&format!("Filename: pool/r/ros-noble-foo/{}\n", DEB)));

    // The gzip twin carries the same bytes
    let gz = read_to_end(&packages_path.with_file_name("Packages.gz")).unwrap();
    assert_eq!(gz, packages.as_bytes());
}

#[tokio::test]
async fn test_release_digests_match_indices() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("build", "binarydeb", DEB);

    repo.import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("build"))
        .await
        .unwrap();

    let dist = farm.repo().join("ubuntu/dists/noble");
    let release = fs::read_to_string(dist.join("Release")).unwrap();
    let lines: Vec<&str> = release.lines().collect();

    let index = ["main/binary-amd64/Packages", "main/binary-amd64/Packages.gz"];
    let positions: Vec<usize> = ["MD5Sum:", "SHA1:", "SHA256:"]
        .iter()
        .map(|header| lines.iter().position(|l| l == header).unwrap())
        .collect();
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);

    for rel in index {
        let digests = FileDigests::from_file(&dist.join(rel)).unwrap();
        let expected = [&digests.md5, &digests.sha1, &digests.sha256];
        for (block, start) in positions.iter().enumerate() {
            let line = format!(" {} {} {}", expected[block], digests.size, rel);
            assert!(
                lines[*start + 1..].iter().take(4).any(|l| *l == line),
                "missing {:?} in {}",
                line,
                release
            );
        }
    }
}

#[tokio::test]
async fn test_import_source_places_all_files() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    for name in [
        "ros-noble-foo_1.0.0-1noble.dsc",
        "ros-noble-foo_1.0.0.orig.tar.gz",
        "ros-noble-foo_1.0.0-1noble.debian.tar.xz",
    ] {
        farm.artifact("build", "sourcedeb", name);
    }
    // Not part of a source package
    farm.artifact("build", "sourcedeb", "build.log");

    repo.import_source(&farm.repo(), "ubuntu", "noble", &farm.build_dir("build"))
        .await
        .unwrap();

    assert_eq!(
        list_files(&farm.repo().join("ubuntu/pool")),
        [
            "r/ros-noble-foo/ros-noble-foo_1.0.0-1noble.debian.tar.xz",
            "r/ros-noble-foo/ros-noble-foo_1.0.0-1noble.dsc",
            "r/ros-noble-foo/ros-noble-foo_1.0.0.orig.tar.gz",
        ]
    );

    let sources =
        fs::read_to_string(farm.repo().join("ubuntu/dists/noble/main/source/Sources")).unwrap();
    assert_eq!(count_stanzas(&sources, "ros-noble-foo"), 1);
    assert!(farm.tool_log_lines()[0].starts_with("enter dpkg-scansources pool/"));
}

#[tokio::test]
async fn test_scanner_arguments() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("build", "binarydeb", DEB);

    repo.import_binary(&farm.repo(), "ubuntu", "noble", "arm64", &farm.build_dir("build"))
        .await
        .unwrap();

    assert_eq!(
        farm.tool_log_lines(),
        [
            "enter dpkg-scanpackages --arch arm64 pool/",
            "exit dpkg-scanpackages",
        ]
    );
}

#[tokio::test]
async fn test_pool_is_shared_across_codenames() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("noble-build", "binarydeb", "foo_1.0-1noble_amd64.deb");
    farm.artifact("jammy-build", "binarydeb", "bar_1.0-1jammy_amd64.deb");

    repo.import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("noble-build"))
        .await
        .unwrap();
    repo.import_binary(&farm.repo(), "ubuntu", "jammy", "amd64", &farm.build_dir("jammy-build"))
        .await
        .unwrap();

    // Indices are regenerated from the whole pool
    let jammy = fs::read_to_string(
        farm.repo().join("ubuntu/dists/jammy/main/binary-amd64/Packages"),
    )
    .unwrap();
    assert_eq!(count_stanzas(&jammy, "foo"), 1);
    assert_eq!(count_stanzas(&jammy, "bar"), 1);
}

#[tokio::test]
async fn test_scanner_failure_keeps_previous_index() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("first", "binarydeb", "foo_1.0_amd64.deb");
    repo.import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("first"))
        .await
        .unwrap();

    let dist = farm.repo().join("ubuntu/dists/noble");
    let packages_before = fs::read(dist.join("main/binary-amd64/Packages")).unwrap();
    let gz_before = fs::read(dist.join("main/binary-amd64/Packages.gz")).unwrap();
    let release_before = fs::read(dist.join("Release")).unwrap();

    let failing = farm.config_with("echo 'Package: partial'\necho boom >&2\nexit 2", SCAN_SOURCES, "");
    let repo = AptRepository::new(&failing).unwrap();
    farm.artifact("second", "binarydeb", "bar_1.0_amd64.deb");

    let err = repo
        .import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("second"))
        .await
        .unwrap_err();
    match err {
        Error::CommandFailed { tool, stderr, .. } => {
            assert_eq!(tool, "dpkg-scanpackages");
            assert_eq!(stderr.trim(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(fs::read(dist.join("main/binary-amd64/Packages")).unwrap(), packages_before);
    assert_eq!(fs::read(dist.join("main/binary-amd64/Packages.gz")).unwrap(), gz_before);
    assert_eq!(fs::read(dist.join("Release")).unwrap(), release_before);
    assert_eq!(list_files(&dist.join("main/binary-amd64")).len(), 2);
}

#[tokio::test]
async fn test_filename_without_underscore_fails_batch() {
    let farm = TestFarm::new();
    let repo = AptRepository::new(&farm.config()).unwrap();
    farm.artifact("build", "binarydeb", "foo_1.0_amd64.deb");
    farm.artifact("build", "binarydeb", "broken.deb");

    let err = repo
        .import_binary(&farm.repo(), "ubuntu", "noble", "amd64", &farm.build_dir("build"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FilenameParse(name) if name == "broken.deb"));
    assert!(!farm.repo().join("ubuntu/pool").exists());
    assert!(farm.tool_log_lines().is_empty());
}

#[test]
fn test_missing_scanner_is_tool_not_found() {
    let farm = TestFarm::new();
    let mut config = farm.config();
    config.tools.dpkg_scansources = farm.root().join("tools/missing").display().to_string();

    assert!(matches!(AptRepository::new(&config), Err(Error::ToolNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_imports_for_one_os_are_serialized() {
    let farm = TestFarm::new();
    let config = farm.config_with(&slow(SCAN_PACKAGES), &slow(SCAN_SOURCES), "");
    let repo = Arc::new(AptRepository::new(&config).unwrap());

    let targets = [("noble", "amd64"), ("noble", "arm64"), ("jammy", "amd64")];
    let mut handles = Vec::new();
    for (i, (code, arch)) in targets.into_iter().enumerate() {
        let build = format!("build-{}", i);
        farm.artifact(&build, "binarydeb", &format!("pkg{}_1.0_{}.deb", i, arch));
        let repo = repo.clone();
        let base = farm.repo();
        let artifacts = farm.build_dir(&build);
        handles.push(tokio::spawn(async move {
            repo.import_binary(&base, "ubuntu", code, arch, &artifacts).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let log = farm.tool_log_lines();
    assert_eq!(log.len(), 6);
    assert_serialized(&log);
    assert_eq!(list_files(&farm.repo().join("ubuntu/pool")).len(), 3);
}
