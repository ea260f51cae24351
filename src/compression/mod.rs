// src/compression/mod.rs
//! Compression utilities for repository index files
//!
//! apt clients fetch either the plain or the gzip-compressed twin of every
//! `Packages`/`Sources` index, so both must always carry identical content.
//! [`TeeWriter`] feeds one stream to two sinks and [`IndexFileWriter`] uses
//! it to produce a plain file and its `.gz` twin from a single pass.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Supported compression formats for index files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use localrepo::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("Packages.gz"), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_extension("Packages"), CompressionFormat::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") {
            Self::Gzip
        } else {
            Self::None
        }
    }

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        }
    }

    /// Path of the twin of `path` in this format
    pub fn twin_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(self.extension());
        PathBuf::from(name)
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Writer that forwards every write to two sinks
///
/// A write only succeeds once both sinks accepted the whole buffer, so the
/// two outputs never diverge silently.
pub struct TeeWriter<A: Write, B: Write> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Split back into the two sinks
    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

/// Writes a plain index file and its gzip twin side by side
///
/// Output goes to temporary files next to the targets; nothing replaces the
/// existing index until [`IndexFileWriter::commit`] succeeds.
pub struct IndexFileWriter {
    path: PathBuf,
    tee: TeeWriter<BufWriter<NamedTempFile>, GzEncoder<BufWriter<NamedTempFile>>>,
}

impl IndexFileWriter {
    /// Start writing `path` and `path.gz`
    pub fn create(path: &Path) -> io::Result<Self> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let raw = NamedTempFile::new_in(dir)?;
        let gz = NamedTempFile::new_in(dir)?;
        let tee = TeeWriter::new(
            BufWriter::new(raw),
            GzEncoder::new(BufWriter::new(gz), Compression::default()),
        );
        Ok(Self {
            path: path.to_path_buf(),
            tee,
        })
    }

    /// Finish both streams and move them over the targets
    pub fn commit(self) -> io::Result<()> {
        let (raw, gz) = self.tee.into_inner();
        let raw = raw.into_inner().map_err(|e| e.into_error())?;
        let gz = gz.finish()?.into_inner().map_err(|e| e.into_error())?;

        for file in [raw.as_file(), gz.as_file()] {
            make_world_readable(file)?;
            file.sync_all()?;
        }

        raw.persist(&self.path).map_err(|e| e.error)?;
        gz.persist(CompressionFormat::Gzip.twin_path(&self.path))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

impl Write for IndexFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tee.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tee.flush()
    }
}

/// Give a freshly created temporary file the permissions of a published file
///
/// Temporary files are created `0600`; index files must stay readable by
/// whatever serves the repository.
pub(crate) fn make_world_readable(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}

/// Write a gzip-compressed copy of `src` to `dst`
pub fn gzip_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let output = File::create(dst)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()
}

/// Read a file, transparently decompressing it based on its extension
pub fn read_to_end(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader: Box<dyn Read> = match CompressionFormat::from_extension(&path.to_string_lossy()) {
        CompressionFormat::None => Box::new(file),
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
    };
    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    Ok(output)
}
