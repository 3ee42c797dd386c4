//! Classpath resolver and context cache
//!
//! Maps classpath sets to loading contexts, lazily building a context on the
//! first request for a set and returning the cached one on every repeat
//! request, however the entries were ordered. Shutdown releases every
//! context the resolver built.

use crate::classpath::ClasspathKey;
use crate::context::{ClassProvider, LoadingContext};
use crate::error::{JarcellError, JarcellResult, ReleaseReport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

enum CacheState {
    Open(HashMap<ClasspathKey, Arc<LoadingContext>>),
    Closed,
}

/// Resolves classpath sets to cached, isolated loading contexts.
///
/// The resolver is the sole owner of every context it builds. It accepts
/// concurrent `resolve` calls; at most one context is ever constructed per
/// distinct classpath set even when callers race on the same set.
pub struct Resolver {
    cache: Mutex<CacheState>,
    parent: Option<Arc<dyn ClassProvider>>,
}

impl Resolver {
    /// Create a resolver whose contexts have no fallback scope
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(CacheState::Open(HashMap::new())),
            parent: None,
        }
    }

    /// Create a resolver whose contexts fall back to the hosting provider.
    ///
    /// Classes the host registers stay visible inside every resolved
    /// context and shadow classpath-local definitions of the same name.
    pub fn with_parent(parent: Arc<dyn ClassProvider>) -> Self {
        Self {
            cache: Mutex::new(CacheState::Open(HashMap::new())),
            parent: Some(parent),
        }
    }

    /// Resolve a classpath to a loading context.
    ///
    /// If a context for the same file set was built previously, that
    /// context is returned unchanged; otherwise a new one is built and
    /// cached. Entry order and duplicates do not affect the set's identity.
    pub fn resolve<I, P>(&self, classpath: I) -> JarcellResult<Arc<LoadingContext>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let key = ClasspathKey::new(classpath);

        let mut cache = self.cache.lock();
        let contexts = match &mut *cache {
            CacheState::Open(contexts) => contexts,
            CacheState::Closed => return Err(JarcellError::ResolverClosed),
        };

        if let Some(context) = contexts.get(&key) {
            debug!("classpath cache hit for {}", key.fingerprint());
            return Ok(Arc::clone(context));
        }

        // Built under the lock so a racing resolve for the same set cannot
        // construct a second context. Nothing is cached on failure.
        let context = Arc::new(LoadingContext::open(&key, self.parent.clone())?);
        info!(
            "built loading context {} ({} entries)",
            key.fingerprint(),
            key.len()
        );
        contexts.insert(key, Arc::clone(&context));
        Ok(context)
    }

    /// Number of contexts currently held in the cache
    pub fn context_count(&self) -> usize {
        match &*self.cache.lock() {
            CacheState::Open(contexts) => contexts.len(),
            CacheState::Closed => 0,
        }
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        matches!(&*self.cache.lock(), CacheState::Closed)
    }

    /// Release every loading context this resolver built.
    ///
    /// Every context is offered its release call even when an earlier one
    /// fails; failures are aggregated into a single [`ReleaseReport`]. The
    /// resolver accepts no further `resolve` calls afterwards. Closing an
    /// already-closed resolver is a no-op.
    pub fn close(&self) -> JarcellResult<()> {
        let contexts = {
            let mut cache = self.cache.lock();
            match std::mem::replace(&mut *cache, CacheState::Closed) {
                CacheState::Open(contexts) => contexts,
                CacheState::Closed => return Ok(()),
            }
        };

        let count = contexts.len();
        let mut failures = Vec::new();
        for (key, context) in contexts {
            let context_failures = context.release();
            if !context_failures.is_empty() {
                debug!(
                    "context {} reported {} release failure(s)",
                    key.fingerprint(),
                    context_failures.len()
                );
                failures.extend(context_failures);
            }
        }
        info!("resolver closed, released {} loading context(s)", count);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(JarcellError::Release(ReleaseReport { failures }))
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::source::ClassSource;
    use crate::context::MemoryProvider;
    use std::fs;
    use tempfile::TempDir;
    use url::Url;

    struct FailingSource {
        origin: Url,
    }

    impl FailingSource {
        fn new(origin: &str) -> Self {
            Self {
                origin: Url::parse(origin).unwrap(),
            }
        }
    }

    impl ClassSource for FailingSource {
        fn origin(&self) -> &Url {
            &self.origin
        }

        fn read(&self, _entry_path: &str) -> JarcellResult<Option<Vec<u8>>> {
            Ok(None)
        }

        fn release(&self) -> JarcellResult<()> {
            Err(JarcellError::io(
                format!("releasing {}", self.origin),
                std::io::Error::other("handle stuck"),
            ))
        }
    }

    fn two_entries() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir(&a).unwrap();
        fs::create_dir(&b).unwrap();
        (temp, a, b)
    }

    #[test]
    fn permutations_share_one_context() {
        let (_temp, a, b) = two_entries();
        let resolver = Resolver::new();

        let first = resolver.resolve([a.clone(), b.clone()]).unwrap();
        let second = resolver.resolve([b, a]).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.context_count(), 1);
    }

    #[test]
    fn duplicates_share_one_context() {
        let (_temp, a, _b) = two_entries();
        let resolver = Resolver::new();

        let first = resolver.resolve([a.clone(), a.clone()]).unwrap();
        let second = resolver.resolve([a]).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.context_count(), 1);
    }

    #[test]
    fn repeated_resolves_construct_once() {
        let (_temp, a, _b) = two_entries();
        let resolver = Resolver::new();

        let first = resolver.resolve([a.clone()]).unwrap();
        for _ in 0..5 {
            let again = resolver.resolve([a.clone()]).unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(resolver.context_count(), 1);
    }

    #[test]
    fn distinct_sets_get_distinct_contexts() {
        let (_temp, a, b) = two_entries();
        let resolver = Resolver::new();

        let first = resolver.resolve([a]).unwrap();
        let second = resolver.resolve([b]).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.context_count(), 2);
    }

    #[test]
    fn invalid_entry_leaves_cache_unchanged() {
        let (_temp, a, _b) = two_entries();
        let resolver = Resolver::new();

        let err = resolver
            .resolve([a.clone(), PathBuf::from("relative.jar")])
            .unwrap_err();
        assert!(matches!(err, JarcellError::UrlConversion { .. }));
        assert_eq!(resolver.context_count(), 0);

        // Same invalid set fails again instead of returning a stale context
        let err = resolver
            .resolve([a, PathBuf::from("relative.jar")])
            .unwrap_err();
        assert!(matches!(err, JarcellError::UrlConversion { .. }));
        assert_eq!(resolver.context_count(), 0);
    }

    #[test]
    fn resolve_after_close_is_rejected() {
        let (_temp, a, _b) = two_entries();
        let resolver = Resolver::new();
        resolver.resolve([a.clone()]).unwrap();

        resolver.close().unwrap();
        assert!(resolver.is_closed());

        let err = resolver.resolve([a]).unwrap_err();
        assert!(matches!(err, JarcellError::ResolverClosed));
    }

    #[test]
    fn close_twice_is_noop() {
        let resolver = Resolver::new();
        resolver.close().unwrap();
        resolver.close().unwrap();
        assert_eq!(resolver.context_count(), 0);
    }

    #[test]
    fn close_aggregates_all_release_failures() {
        let resolver = Resolver::new();
        {
            let mut cache = resolver.cache.lock();
            if let CacheState::Open(contexts) = &mut *cache {
                contexts.insert(
                    ClasspathKey::new(["/stuck/a.jar"]),
                    Arc::new(LoadingContext::from_parts(
                        vec![],
                        vec![Box::new(FailingSource::new("file:///stuck/a.jar"))],
                        None,
                    )),
                );
                contexts.insert(
                    ClasspathKey::new(["/stuck/b.jar"]),
                    Arc::new(LoadingContext::from_parts(
                        vec![],
                        vec![
                            Box::new(FailingSource::new("file:///stuck/b.jar")),
                            Box::new(FailingSource::new("file:///stuck/c.jar")),
                        ],
                        None,
                    )),
                );
            }
        }

        let err = resolver.close().unwrap_err();
        match err {
            JarcellError::Release(report) => {
                // Every failing source is reported, across all contexts
                assert_eq!(report.failures.len(), 3);
                let origins: Vec<&str> =
                    report.failures.iter().map(|f| f.origin.as_str()).collect();
                assert!(origins.contains(&"file:///stuck/a.jar"));
                assert!(origins.contains(&"file:///stuck/b.jar"));
                assert!(origins.contains(&"file:///stuck/c.jar"));
            }
            other => panic!("expected Release error, got {other:?}"),
        }
        assert!(resolver.is_closed());
    }

    #[test]
    fn concurrent_resolves_build_one_context() {
        let (_temp, a, _b) = two_entries();
        let resolver = Arc::new(Resolver::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let entry = a.clone();
                std::thread::spawn(move || resolver.resolve([entry]).unwrap())
            })
            .collect();

        let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(resolver.context_count(), 1);
        for context in &contexts[1..] {
            assert!(Arc::ptr_eq(&contexts[0], context));
        }
    }

    #[test]
    fn parent_is_shared_by_all_contexts() {
        let (_temp, a, b) = two_entries();

        let mut host = MemoryProvider::new();
        host.register_class("com.example.Shared", b"host-bytes".to_vec());
        let resolver = Resolver::with_parent(Arc::new(host));

        let first = resolver.resolve([a]).unwrap();
        let second = resolver.resolve([b]).unwrap();

        for context in [first, second] {
            let class = context.load_class("com.example.Shared").unwrap().unwrap();
            assert_eq!(class.bytes, b"host-bytes");
        }
    }
}
