//! Filesystem rule loader.
//!
//! Reads rule definitions from a single YAML file or a directory tree of YAML
//! files, then initializes them. Files that fail to parse and rules that fail
//! to initialize are reported individually and never abort the whole load.

mod core;
mod error;


pub use self::core::{InitFailure, InitReport, LoadedDefinition, RuleLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
