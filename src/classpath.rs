//! Classpath-set identity
//!
//! Collapses a caller-supplied sequence of classpath entries into a
//! deduplicated, order-independent key. Same file set = same key, no matter
//! how the entries were ordered or repeated on input.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Identity of a classpath set.
///
/// Entries are held sorted and deduplicated, so equality and hashing are
/// stable once a key has been used in a cache. Two input sequences that
/// denote the same set of files always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClasspathKey {
    entries: BTreeSet<PathBuf>,
}

impl ClasspathKey {
    /// Build a key from any sequence of paths, collapsing duplicates
    pub fn new<I, P>(classpath: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: classpath.into_iter().map(Into::into).collect(),
        }
    }

    /// Iterate the entries in sorted order
    pub fn entries(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the key holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content fingerprint of the entry set, first 12 hex chars of SHA256.
    ///
    /// For logging and diagnostics only; cache identity is the set itself.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.as_os_str().as_encoded_bytes());
            // Separator so adjacent entries cannot run together
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..6])
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for ClasspathKey {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::new(iter)
    }
}
