//! The resolved, downloadable unit the rest of the pipeline passes around: a single
//! `(filename, source url, digest)` triple plus what the classifier could recover from its name.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::tags::CompatTag;
use crate::types::artifact_name::ArtifactName;
use crate::types::Version;

/// A single candidate download: a wheel or sdist discovered on an index, with whatever the
/// classifier could recover from its filename and whatever the cache layer has filled in so
/// far.
///
/// An `Artifact` is created during classification with an empty `sha256` and is updated exactly
/// once, during download, when the digest becomes known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The parsed artifact name (wheel or sdist).
    pub name: ArtifactName,

    /// The absolute URL this artifact was discovered at.
    pub url: Url,

    /// Lowercase hex SHA-256, 64 characters. Empty until the artifact is downloaded (or,
    /// outside `strict_hash` mode, if the index never advertised a digest).
    pub sha256: String,

    /// The compatibility tag this wheel ranked best under in the host environment, if this is
    /// a wheel and at least one of its tags matched. `None` for sdists, and for wheels with no
    /// environment-matching tag (which then sort last and are effectively unselectable).
    pub matched_tag: Option<CompatTag>,
}

impl Artifact {
    /// The artifact's version, per its parsed name.
    pub fn version(&self) -> Version {
        self.name.version()
    }

    /// True if this artifact is a wheel.
    pub fn is_wheel(&self) -> bool {
        self.name.is_wheel()
    }

    /// The artifact's filename as it appeared on the index.
    pub fn filename(&self) -> String {
        self.name.to_string()
    }

    /// Records a computed digest. Called exactly once, after a successful download.
    pub fn set_digest(&mut self, sha256: String) {
        self.sha256 = sha256;
    }
}
