//! Loading context construction and lookup
//!
//! Lookup follows parent-first delegation: a name is offered to the parent
//! provider before the context's own sources, so host-provided definitions
//! win over classpath-local ones, and classpath-local definitions are only
//! visible within their own context.

use crate::classpath::ClasspathKey;
use crate::context::source::{file_url, ArchiveSource, ClassSource, DirectorySource};
use crate::error::{JarcellError, JarcellResult, ReleaseFailure};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A namespace that can supply class and resource bytes.
///
/// The hosting side of a [`LoadingContext`] implements this; contexts
/// implement it themselves so they can chain as parents.
pub trait ClassProvider: Send + Sync {
    /// Find the bytes of a class by binary name (`com.example.Foo`)
    fn find_class(&self, binary_name: &str) -> JarcellResult<Option<Vec<u8>>>;

    /// Find the bytes of an arbitrary entry path
    fn find_resource(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
        let _ = entry_path;
        Ok(None)
    }
}

/// A class resolved through a loading context
#[derive(Debug, Clone)]
pub struct LoadedClass {
    /// Binary name the class was requested under
    pub binary_name: String,

    /// Raw class bytes
    pub bytes: Vec<u8>,

    /// Location the bytes came from; `None` when the parent supplied them
    pub origin: Option<Url>,
}

/// Map a binary class name to its classpath entry path
fn class_resource_path(binary_name: &str) -> JarcellResult<String> {
    if binary_name.is_empty()
        || binary_name.starts_with('.')
        || binary_name.ends_with('.')
        || binary_name.contains("..")
        || binary_name.contains('/')
        || binary_name.contains('\\')
    {
        return Err(JarcellError::InvalidClassName {
            name: binary_name.to_string(),
        });
    }
    Ok(format!("{}.class", binary_name.replace('.', "/")))
}

/// An isolated namespace over one classpath set.
///
/// Owns the location URLs derived from the set, one open source per usable
/// entry, and the parent provider used as the fallback scope.
pub struct LoadingContext {
    locations: Vec<Url>,
    sources: Vec<Box<dyn ClassSource>>,
    parent: Option<Arc<dyn ClassProvider>>,
    created_at: DateTime<Utc>,
}

impl LoadingContext {
    /// Build a context for a classpath key.
    ///
    /// Every entry is converted to a location URL first; only then are
    /// sources opened, so an unconvertible entry never leaves handles
    /// behind. Entries missing on disk contribute a location but no source.
    pub(crate) fn open(
        key: &ClasspathKey,
        parent: Option<Arc<dyn ClassProvider>>,
    ) -> JarcellResult<Self> {
        let mut locations = Vec::with_capacity(key.len());
        for entry in key.entries() {
            locations.push(file_url(entry)?);
        }

        let mut sources: Vec<Box<dyn ClassSource>> = Vec::new();
        for entry in key.entries() {
            if entry.is_dir() {
                sources.push(Box::new(DirectorySource::new(entry)?));
            } else if entry.is_file() {
                sources.push(Box::new(ArchiveSource::open(entry)?));
            } else {
                debug!("classpath entry {} does not exist, skipping", entry.display());
            }
        }

        Ok(Self {
            locations,
            sources,
            parent,
            created_at: Utc::now(),
        })
    }

    pub(crate) fn from_parts(
        locations: Vec<Url>,
        sources: Vec<Box<dyn ClassSource>>,
        parent: Option<Arc<dyn ClassProvider>>,
    ) -> Self {
        Self {
            locations,
            sources,
            parent,
            created_at: Utc::now(),
        }
    }

    /// Location URLs this context searches, in sorted entry order
    pub fn locations(&self) -> &[Url] {
        &self.locations
    }

    /// When this context was built
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Resolve a class by binary name, parent first.
    ///
    /// Returns the class record with its origin location when one of this
    /// context's own sources supplied the bytes.
    pub fn load_class(&self, binary_name: &str) -> JarcellResult<Option<LoadedClass>> {
        let entry_path = class_resource_path(binary_name)?;

        if let Some(parent) = &self.parent {
            if let Some(bytes) = parent.find_class(binary_name)? {
                return Ok(Some(LoadedClass {
                    binary_name: binary_name.to_string(),
                    bytes,
                    origin: None,
                }));
            }
        }

        for source in &self.sources {
            if let Some(bytes) = source.read(&entry_path)? {
                return Ok(Some(LoadedClass {
                    binary_name: binary_name.to_string(),
                    bytes,
                    origin: Some(source.origin().clone()),
                }));
            }
        }

        Ok(None)
    }

    /// Offer every source its release call, collecting all failures.
    ///
    /// An empty return means every source released (or had nothing to
    /// release). Only the owning resolver releases contexts; holders of a
    /// resolved context cannot.
    pub(crate) fn release(&self) -> Vec<ReleaseFailure> {
        let mut failures = Vec::new();
        for source in &self.sources {
            if let Err(err) = source.release() {
                failures.push(ReleaseFailure {
                    origin: source.origin().to_string(),
                    reason: err.to_string(),
                });
            }
        }
        failures
    }
}

impl ClassProvider for LoadingContext {
    fn find_class(&self, binary_name: &str) -> JarcellResult<Option<Vec<u8>>> {
        Ok(self.load_class(binary_name)?.map(|class| class.bytes))
    }

    fn find_resource(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
        if let Some(parent) = &self.parent {
            if let Some(bytes) = parent.find_resource(entry_path)? {
                return Ok(Some(bytes));
            }
        }
        for source in &self.sources {
            if let Some(bytes) = source.read(entry_path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for LoadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingContext")
            .field("locations", &self.locations)
            .field("sources", &self.sources.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// An in-memory provider, typically the hosting side of a resolver.
///
/// The host registers the classes and resources it wants visible to every
/// loading context; lookups are plain map hits.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    classes: HashMap<String, Vec<u8>>,
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its binary name
    pub fn register_class(&mut self, binary_name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(binary_name.into(), bytes);
    }

    /// Register a resource under its entry path
    pub fn register_resource(&mut self, entry_path: impl Into<String>, bytes: Vec<u8>) {
        self.resources.insert(entry_path.into(), bytes);
    }
}

impl ClassProvider for MemoryProvider {
    fn find_class(&self, binary_name: &str) -> JarcellResult<Option<Vec<u8>>> {
        Ok(self.classes.get(binary_name).cloned())
    }

    fn find_resource(&self, entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
        Ok(self.resources.get(entry_path).cloned())
    }
}
