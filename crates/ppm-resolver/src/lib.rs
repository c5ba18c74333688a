//! `ppm-resolver` is a library for resolving and lock-generating Python PyPI packages from Rust,
//! without installing anything. Given a set of requirement strings and one or more PEP 503
//! index URLs, it walks the transitive `Requires-Dist` graph, selects one artifact per package,
//! downloads and verifies it, and emits a deterministic lock.
//!
//! The resolution strategy is **greedy-commit**: the first version chosen for a package is
//! final. There is no backtracking SAT solver underneath this crate, so a requirement graph
//! that needs a different version of an already-committed package to be satisfiable will fail
//! rather than be resolved by revisiting earlier choices. See [`Resolver::run`] for details.

#![deny(missing_docs)]

/// Core data types: package names, artifact names, requirements, and marker expressions.
pub mod types;

/// Resolver configuration accepted from the CLI or library callers.
pub mod config;

/// The error taxonomy for a resolve pass.
pub mod error;

/// The pure, no-I/O environment probe.
pub mod env;

/// Wheel compatibility tag ranking.
pub mod tags;

/// Tolerant HTML index-listing parsing.
pub mod html;

/// Thin `reqwest`-based HTTP transport with timeout and retry.
pub mod http;

/// The PEP 503 index client.
pub mod index_client;

/// Classifies raw index listing entries into wheel or sdist artifacts.
pub mod classifier;

/// Chooses the best artifact for a requirement among classified candidates.
pub mod selector;

/// Content-addressed on-disk artifact cache with digest verification.
pub mod cache;

/// Extracts `Requires-Dist` lines from a downloaded wheel's metadata.
pub mod metadata;

/// The transitive dependency-expansion engine.
pub mod transitive;

/// The top-level resolve driver.
pub mod resolver;

/// Deterministic lock output emission (`lock.json`, `pylock.toml`, matrix files, verifier).
pub mod lock;

mod utils;

pub use config::ResolverConfig;
pub use error::ResolveError;
pub use resolver::{ResolvedPackage, Resolver};
pub use utils::normalize_index_url;
