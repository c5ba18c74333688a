//! The configuration record accepted by the resolver core (§6 of the design).

use std::path::PathBuf;

use url::Url;

use crate::error::ConfigError;

/// Options recognized by a resolve pass. Constructed either programmatically (library use) or
/// by the `ppm` CLI front-end.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Absolute path containing the `.ppm/cache/` subtree and where outputs are written.
    pub root: PathBuf,

    /// Primary listing base URL.
    pub index_url: Url,

    /// Zero or more additional listing bases, consulted in order after the primary.
    pub extra_index_urls: Vec<Url>,

    /// Ordered list of requirement strings; seeds the queue.
    pub requirements: Vec<String>,

    /// When false the transitive engine is skipped.
    pub follow_transitives: bool,

    /// When true an `Artifact` lacking a digest is fatal.
    pub strict_hash: bool,

    /// Per-request HTTP timeout.
    pub timeout_seconds: u64,

    /// Per-request retry count.
    pub retries: u32,

    /// Substituted into outgoing HTTP headers.
    pub user_agent: String,
}

impl ResolverConfig {
    /// Validates the record eagerly, before any I/O is performed, matching the error
    /// taxonomy's "fatal before any I/O" rule for [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_url.as_str().is_empty() {
            return Err(ConfigError::MissingIndexUrl);
        }
        if !self.root.is_absolute() {
            return Err(ConfigError::RootNotAbsolute(self.root.display().to_string()));
        }
        std::fs::create_dir_all(self.cache_dir())
            .map_err(|e| ConfigError::RootNotCreatable(self.root.display().to_string(), e))?;
        Ok(())
    }

    /// The directory artifacts are downloaded into: `<root>/.ppm/cache`.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".ppm").join("cache")
    }

    /// The directory the structured lock outputs are written into: `<root>/.ppm`.
    pub fn ppm_dir(&self) -> PathBuf {
        self.root.join(".ppm")
    }

    /// Every configured index, primary first.
    pub fn indexes(&self) -> impl Iterator<Item = &Url> {
        std::iter::once(&self.index_url).chain(self.extra_index_urls.iter())
    }
}
