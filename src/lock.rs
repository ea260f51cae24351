// src/lock.rs

//! Per-directory exclusive locks for repository writers
//!
//! Every import both mutates the package pool and regenerates the index of a
//! repository directory, so writers to the same directory must be serialized
//! while writers to different directories proceed in parallel.
//!
//! # Lock Strategy
//!
//! - One async mutex per distinct (absolutized) directory path
//! - A single process-wide table ([`repository_locks`]) shared by every
//!   engine, however many engines are constructed
//! - Entries are created lazily and never evicted; the key space is the
//!   handful of OS/arch directories touched during one build run
//! - The guard releases the lock on drop, so every exit path unlocks
//!
//! # Example
//!
//! ```ignore
//! let locks = RepositoryLockManager::new();
//! let _guard = locks.acquire(&repo_dir).await;
//! // ... mutate repo_dir ...
//! ```

use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

static REPOSITORY_LOCKS: LazyLock<RepositoryLockManager> = LazyLock::new(RepositoryLockManager::new);

/// Lock table shared by all repository engines of this process
pub fn repository_locks() -> &'static RepositoryLockManager {
    &REPOSITORY_LOCKS
}

/// Maps repository directories to exclusive locks
#[derive(Default)]
pub struct RepositoryLockManager {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl RepositoryLockManager {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `path`
    ///
    /// Waiters are served in first-come-first-served order. Acquiring the
    /// same path twice from one task deadlocks; callers never nest.
    pub async fn acquire(&self, path: &Path) -> DirectoryLock {
        let key = lock_key(path);
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        debug!("Waiting for repository lock on {:?}", key);
        let guard = mutex.lock_owned().await;
        debug!("Acquired repository lock on {:?}", key);

        DirectoryLock {
            _guard: guard,
            path: key,
        }
    }

    /// Number of distinct directories that have been locked so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Scoped exclusive access to one repository directory
pub struct DirectoryLock {
    _guard: OwnedMutexGuard<()>,
    path: PathBuf,
}

impl DirectoryLock {
    /// Get the locked directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        debug!("Released repository lock on {:?}", self.path);
    }
}

/// Normalize a path so different spellings of one directory share a lock
///
/// Existing directories are canonicalized (resolving symlinks); paths that
/// do not exist yet are made absolute and lexically cleaned.
fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
