// src/hash.rs

//! Digest computation for repository index files
//!
//! The apt `Release` descriptor lists every index file three times, once per
//! digest family:
//! - **MD5Sum**: legacy, still read by older apt clients
//! - **SHA1**: legacy
//! - **SHA256**: the checksum modern apt actually verifies
//!
//! [`FileDigests`] computes all three in a single read of the file.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Digest algorithms listed in a Release file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// All algorithms, in the order their blocks appear in a Release file
    pub const RELEASE_ORDER: [HashAlgorithm; 3] = [Self::Md5, Self::Sha1, Self::Sha256];

    /// Get the hash output length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    /// Field name introducing this algorithm's block in a Release file
    pub const fn release_field(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5Sum",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Get the algorithm name as a string
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hasher that can compute hashes using any supported algorithm
pub struct Hasher {
    state: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    /// Create a new hasher with the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            HashAlgorithm::Sha1 => HasherState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Md5(hasher) => hasher.update(data),
            HasherState::Sha1(hasher) => hasher.update(data),
            HasherState::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finalize and return the lowercase hex digest
    pub fn finalize(self) -> String {
        match self.state {
            HasherState::Md5(hasher) => hex::encode(hasher.finalize()),
            HasherState::Sha1(hasher) => hex::encode(hasher.finalize()),
            HasherState::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Compute the hex digest of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Size and all Release digests of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub size: u64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl FileDigests {
    /// Compute every digest from a reader in one pass
    pub fn from_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut md5 = Hasher::new(HashAlgorithm::Md5);
        let mut sha1 = Hasher::new(HashAlgorithm::Sha1);
        let mut sha256 = Hasher::new(HashAlgorithm::Sha256);
        let mut size = 0u64;
        let mut buffer = [0u8; 8192];

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            md5.update(&buffer[..n]);
            sha1.update(&buffer[..n]);
            sha256.update(&buffer[..n]);
            size += n as u64;
        }

        Ok(Self {
            size,
            md5: md5.finalize(),
            sha1: sha1.finalize(),
            sha256: sha256.finalize(),
        })
    }

    /// Compute every digest of a file on disk
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        Self::from_reader(&mut file)
    }

    /// Get the digest for a given algorithm
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_known_digests() {
        let data = b"Hello, World!";
        assert_eq!(
            hash_bytes(HashAlgorithm::Md5, data),
            "65a8e27d8879283831b664bd8b7f0ad4"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha1, data),
            "0a0a9f2a6772942557ab5355d76af442f8f65e01"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha256, data),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            hash_bytes(HashAlgorithm::Md5, b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hash_bytes(HashAlgorithm::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_lengths() {
        for algorithm in HashAlgorithm::RELEASE_ORDER {
            assert_eq!(hash_bytes(algorithm, b"x").len(), algorithm.hex_len());
        }
    }

    #[test]
    fn test_file_digests_match_individual_hashes() {
        let mut file = NamedTempFile::new().unwrap();
        let content = vec![0x5au8; 20_000];
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        let digests = FileDigests::from_file(file.path()).unwrap();
        assert_eq!(digests.size, 20_000);
        for algorithm in HashAlgorithm::RELEASE_ORDER {
            assert_eq!(digests.get(algorithm), hash_bytes(algorithm, &content));
        }
    }

    #[test]
    fn test_release_field_names() {
        let fields: Vec<_> = HashAlgorithm::RELEASE_ORDER
            .iter()
            .map(|a| a.release_field())
            .collect();
        assert_eq!(fields, ["MD5Sum", "SHA1", "SHA256"]);
    }
}
