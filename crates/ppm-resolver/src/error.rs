//! The error taxonomy for the resolver pipeline.
//!
//! Each variant below corresponds to one of the error categories a resolve pass can hit.
//! `ConfigError`, `ResolutionError`, `IntegrityError` and `CycleError` are always fatal and
//! propagate all the way to the CLI boundary as a [`ResolveError`]. `NetworkError` is fatal only
//! for an artifact download after the retry budget is exhausted; a per-index listing failure is
//! absorbed by [`crate::index_client`] and never constructed as a `ResolveError`. `ParseError` is
//! always absorbed by the component that encounters it.

use miette::Diagnostic;
use thiserror::Error;

/// Configuration is missing or malformed. Raised before any I/O happens.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// `index_url` was not set.
    #[error("no index_url configured")]
    MissingIndexUrl,

    /// `root` is not an absolute path.
    #[error("root path '{0}' must be absolute")]
    RootNotAbsolute(String),

    /// `root` could not be created.
    #[error("failed to create root directory '{0}': {1}")]
    RootNotCreatable(String, #[source] std::io::Error),

    /// A requirement string failed to parse.
    #[error("invalid requirement '{0}': {1}")]
    InvalidRequirement(String, String),

    /// The configured `user_agent`/`timeout_seconds` could not build an HTTP client.
    #[error("failed to construct HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The on-disk cache directory could not be opened.
    #[error("failed to open cache directory '{0}': {1}")]
    CacheDirNotCreatable(String, #[source] std::io::Error),
}

/// Network I/O failed. Listing failures on a single index are absorbed by the index client and
/// never surface as this error; a download failure after the retry budget is exhausted does.
#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    /// The request timed out or the connection was reset after exhausting the retry budget.
    #[error("request to '{url}' failed after {retries} retries: {source}")]
    RetriesExhausted {
        /// The URL that was being fetched.
        url: String,
        /// The configured retry budget.
        retries: u32,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A non-2xx response was returned for a download (listing misses are absorbed, not raised
    /// here).
    #[error("download of '{url}' failed with status {status}")]
    BadStatus {
        /// The URL that was being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Writing the downloaded bytes to the cache directory failed.
    #[error("failed to write cache file '{0}': {1}")]
    CacheWrite(String, #[source] std::io::Error),

    /// Re-reading an already-cached artifact off disk failed, e.g. because it was removed
    /// between the digest check and the transitive engine opening it as a zip archive.
    #[error("failed to read cache file '{0}': {1}")]
    CacheRead(String, #[source] std::io::Error),
}

/// A malformed filename, metadata line, version string, or marker expression. Always absorbed:
/// the offending record is skipped and the pass continues.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    /// An artifact filename did not match the wheel or sdist naming convention.
    #[error("could not classify filename '{0}'")]
    UnrecognizedFilename(String),

    /// A version segment of a filename or `Requires-Dist` line is not a valid PEP 440 version.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// A `Requires-Dist` line or CLI requirement string could not be parsed.
    #[error("invalid requirement '{0}': {1}")]
    InvalidRequirement(String, String),

    /// A marker expression could not be parsed.
    #[error("invalid marker expression '{0}': {1}")]
    InvalidMarker(String, String),
}

/// No candidate artifact satisfies a requirement, either because no version on any index
/// matches the specifier or because no wheel/sdist exists for the chosen version. Fatal.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolutionError {
    /// No artifact at all was found across every configured index.
    #[error("no candidate found for requirement '{requirement}'")]
    NoCandidate {
        /// The textual form of the unsatisfied requirement.
        requirement: String,
    },
}

/// A declared digest does not match the computed digest, or `strict_hash` demanded a digest
/// that could not be produced. Fatal; the lock is not written.
#[derive(Debug, Error, Diagnostic)]
pub enum IntegrityError {
    /// The `sha256=` fragment advertised by the index does not match the downloaded bytes.
    #[error("sha256 mismatch for '{filename}': index advertised {expected}, computed {actual}")]
    HashMismatch {
        /// The artifact filename.
        filename: String,
        /// The digest advertised in the listing fragment.
        expected: String,
        /// The digest actually computed from the downloaded bytes.
        actual: String,
    },

    /// `strict_hash` is active and no digest (hint or computed) is available.
    #[error("strict_hash is set but no digest is available for '{0}'")]
    MissingDigest(String),
}

/// A canonical name that is `seen` but not yet `resolved` was re-entered into the queue. Under
/// greedy-commit semantics this should never happen; if it does, it indicates an internal
/// invariant break in the transitive engine rather than a user-facing mistake.
#[derive(Debug, Error, Diagnostic)]
#[error("internal invariant violated: '{0}' was re-entered while seen but unresolved")]
pub struct CycleError(pub String);

/// The union of every fatal error a resolve pass can produce.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// See [`ConfigError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    /// See [`NetworkError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    /// See [`ResolutionError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    /// See [`IntegrityError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Integrity(#[from] IntegrityError),

    /// See [`CycleError`].
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cycle(#[from] CycleError),

    /// Writing one of the lock outputs failed.
    #[error("failed to write '{0}': {1}")]
    OutputWrite(String, #[source] std::io::Error),
}
