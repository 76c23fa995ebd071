//! Flat ZIP packaging of export artifacts.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use dbpack_core::Artifact;

use crate::atomic::write_bytes_atomic;
use crate::errors::PackageError;

/// Something to place in the archive.
#[derive(Debug, Clone)]
pub enum PackageItem {
    /// Bytes already held in memory.
    Artifact(Artifact),
    /// A file that must exist on disk when packaging runs.
    File(PathBuf),
}

impl PackageItem {
    /// Entry name inside the archive: the last path component only.
    pub fn entry_name(&self) -> Result<String, PackageError> {
        let raw = match self {
            PackageItem::Artifact(artifact) => artifact.name().to_string(),
            PackageItem::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| PackageError::InvalidName(path.display().to_string()))?,
        };
        let flat = raw.rsplit(['/', '\\']).next().unwrap_or_default().to_string();
        if flat.is_empty() || flat == "." || flat == ".." {
            return Err(PackageError::InvalidName(raw));
        }
        Ok(flat)
    }

    fn bytes(&self) -> Result<Cow<'_, [u8]>, PackageError> {
        match self {
            PackageItem::Artifact(artifact) => Ok(Cow::Borrowed(artifact.bytes())),
            PackageItem::File(path) => std::fs::read(path).map(Cow::Owned).map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    PackageError::Missing(path.clone())
                } else {
                    PackageError::Io(err)
                }
            }),
        }
    }
}

impl From<Artifact> for PackageItem {
    fn from(artifact: Artifact) -> Self {
        PackageItem::Artifact(artifact)
    }
}

/// A written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub path: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

impl PackageSummary {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Builds flattened ZIP archives.
#[derive(Debug, Clone)]
pub struct Packager {
    compression: CompressionMethod,
}

impl Default for Packager {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }
}

impl Packager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    /// Package `items` into `archive_path`, one entry per item.
    ///
    /// Every item is checked before anything is written, so a missing file
    /// or a name clash leaves `archive_path` untouched.
    pub fn package(&self, items: &[PackageItem], archive_path: &Path) -> Result<PackageSummary, PackageError> {
        let mut names = BTreeSet::new();
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let name = item.entry_name()?;
            if !names.insert(name.clone()) {
                return Err(PackageError::Duplicate(name));
            }
            entries.push(name);
        }

        let options = SimpleFileOptions::default()
            .compression_method(self.compression)
            .last_modified_time(zip::DateTime::default());
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (item, name) in items.iter().zip(&entries) {
            let bytes = item.bytes()?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }
        let archive = zip.finish()?.into_inner();

        write_bytes_atomic(archive_path, &archive)?;
        tracing::info!(
            event = "archive_written",
            path = %archive_path.display(),
            entries = entries.len(),
            bytes = archive.len()
        );

        Ok(PackageSummary {
            path: archive_path.to_path_buf(),
            entries,
        })
    }
}
