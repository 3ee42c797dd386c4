//! jarcell - cached, isolated class loading contexts
//!
//! Lets a build-tool plugin load user-supplied transformation classes from
//! arbitrary classpath entries without leaking duplicate loading contexts or
//! re-parsing the same archives. [`Resolver`] maps each distinct classpath
//! set to one [`LoadingContext`]; repeat requests for the same set, in any
//! order, return the cached context. [`Resolver::close`] releases every
//! context the resolver built.

pub mod classpath;
pub mod context;
pub mod error;
pub mod resolver;

pub use classpath::ClasspathKey;
pub use context::{
    ArchiveSource, ClassProvider, ClassSource, DirectorySource, LoadedClass, LoadingContext,
    MemoryProvider,
};
pub use error::{JarcellError, JarcellResult, ReleaseFailure, ReleaseReport};
pub use resolver::Resolver;
