// src/lib.rs

//! Local apt and RPM repository import engine
//!
//! Maintains OS-native package repositories that are filled incrementally as
//! a build farm produces packages, so installers can consume a consistent
//! index at any time.
//!
//! # Architecture
//!
//! - Pool is truth: indices are always regenerated from the full pool
//! - One writer per directory: imports lock the repository directory they
//!   modify, unrelated directories proceed in parallel
//! - Native tooling: `dpkg-scanpackages`/`dpkg-scansources` and
//!   `createrepo_c` produce the index contents
//! - Latest wins: an RPM import replaces any stored package with the same
//!   name, regardless of version

pub mod compression;
pub mod config;
mod error;
pub mod hash;
pub mod identity;
pub mod importer;
pub mod lock;
pub mod repository;
pub mod tools;

pub use config::LocalRepoConfig;
pub use error::{Error, Result};
pub use identity::{DebIdentity, RpmIdentity};
pub use importer::{LocalImporter, Target};
pub use lock::{DirectoryLock, RepositoryLockManager, repository_locks};
pub use repository::{
    LocalRepository, RepositoryEngine, RepositoryFormat, RepositoryLocation, select_engine,
    select_format,
};
