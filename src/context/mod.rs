//! Isolated loading contexts
//!
//! A loading context serves class and resource bytes from a fixed set of
//! classpath locations, delegating parent-first to the hosting provider so
//! that shared framework types stay visible to plugin code while
//! classpath-local definitions remain isolated per context.

pub mod loader;
pub mod source;

pub use loader::{ClassProvider, LoadedClass, LoadingContext, MemoryProvider};
pub use source::{ArchiveSource, ClassSource, DirectorySource};
