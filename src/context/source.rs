//! Classpath sources
//!
//! A source serves raw entry bytes from one classpath location: an exploded
//! class directory or a jar/zip archive. Archive sources keep their file
//! handle open for the lifetime of the owning context and support explicit
//! release; directory sources have nothing to release and keep the no-op
//! default.

use crate::error::{JarcellError, JarcellResult};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;
use zip::result::ZipError;
use zip::ZipArchive;

/// Convert a classpath entry to its location URL
pub(crate) fn file_url(path: &Path) -> JarcellResult<Url> {
    Url::from_file_path(path).map_err(|()| JarcellError::UrlConversion {
        path: path.to_path_buf(),
        reason: "not an absolute filesystem path".to_string(),
    })
}

/// One classpath location that can serve entry bytes by relative path
pub trait ClassSource: Send + Sync {
    /// Location this source reads from
    fn origin(&self) -> &Url;

    /// Read the bytes of an entry such as `com/example/Foo.class`.
    ///
    /// Returns `Ok(None)` when this source does not contain the entry.
    fn read(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>>;

    /// Free underlying resource handles.
    ///
    /// Sources without handles keep this no-op default.
    fn release(&self) -> JarcellResult<()> {
        Ok(())
    }
}

/// Entry paths must stay inside the source root
fn is_unsafe_entry(entry_path: &str) -> bool {
    let path = Path::new(entry_path);
    path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

/// An exploded class directory on disk
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    origin: Url,
}

impl DirectorySource {
    /// Create a source over a directory root
    pub fn new(root: &Path) -> JarcellResult<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            origin: file_url(root)?,
        })
    }
}

impl ClassSource for DirectorySource {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn read(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
        if is_unsafe_entry(entry_path) {
            return Ok(None);
        }
        let path = self.root.join(entry_path);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| JarcellError::io(format!("reading {}", path.display()), e))
    }
}

/// A jar/zip archive classpath entry.
///
/// The archive is opened eagerly and the handle stays open until `release`,
/// so repeated lookups never re-parse the central directory.
pub struct ArchiveSource {
    path: PathBuf,
    origin: Url,
    archive: Mutex<Option<ZipArchive<BufReader<File>>>>,
}

impl std::fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl ArchiveSource {
    /// Open an archive classpath entry
    pub fn open(path: &Path) -> JarcellResult<Self> {
        let origin = file_url(path)?;
        let file = File::open(path).map_err(|source| JarcellError::EntryOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| JarcellError::Archive {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            "opened archive {} ({} entries)",
            path.display(),
            archive.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            origin,
            archive: Mutex::new(Some(archive)),
        })
    }
}

impl ClassSource for ArchiveSource {
    fn origin(&self) -> &Url {
        &self.origin
    }

    fn read(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
        if is_unsafe_entry(entry_path) {
            return Ok(None);
        }
        let mut guard = self.archive.lock();
        let archive = guard.as_mut().ok_or_else(|| JarcellError::SourceReleased {
            path: self.path.clone(),
        })?;
        let mut entry = match archive.by_name(entry_path) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(JarcellError::Archive {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(|e| {
            JarcellError::io(
                format!("reading {} from {}", entry_path, self.path.display()),
                e,
            )
        })?;
        Ok(Some(bytes))
    }

    fn release(&self) -> JarcellResult<()> {
        if self.archive.lock().take().is_some() {
            debug!("released archive {}", self.path.display());
        }
        Ok(())
    }
}
