//! Stackfile State - loading state documents into a release universe
//!
//! A state file is rendered in two passes (environment first, then the full
//! document), merged with its `bases`, and recursively expanded through its
//! nested `helmfiles` inclusions. The result is a flat, ordered release
//! universe together with the subset picked by each state's selectors.

pub mod env;
pub mod error;
pub mod loader;
pub mod options;
pub mod release;

pub use env::ResolvedEnvironment;
pub use error::{Result, StateError};
pub use loader::{LoadedState, State, StateLoader, load};
pub use options::{DEFAULT_ENVIRONMENT, DEFAULT_HELM_BINARY, LoadOptions};
