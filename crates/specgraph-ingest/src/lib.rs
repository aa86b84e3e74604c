//! Specgraph ingestion: from upstream resource specifications to a frozen
//! model database.
//!
//! ## Module Organization
//!
//! - `sources` - serde shapes of every upstream document
//! - `loader` - read, patch, then parse a source document
//! - `patches` - built-in patch sets for known upstream defects
//! - `import` - one importer per source shape, plus type reconciliation
//! - `config` - which files the build reads
//! - `pipeline` - load everything, import in order, freeze
//!
//! ## Build order
//!
//! registry, legacy (regions merged in order), SAM, documentation, stateful
//! resources, identifier overrides, out-of-band relationships. Each is
//! optional except the registry.

pub mod config;
pub mod import;
pub mod loader;
pub mod patches;
pub mod pipeline;
pub mod sources;

pub use config::{BuildConfig, RegionSource};
pub use import::ImportError;
pub use loader::{LoadFailure, LoadFailureKind, Loaded, SourceKind, SourceLoader};
pub use patches::builtin_patch_sets;
pub use pipeline::{build_database, build_database_with, import_sources, load_sources, BuildError, LoadedSources};
