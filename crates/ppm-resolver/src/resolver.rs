//! The top-level resolve driver (§4.7, §5): drains a FIFO requirement queue, invoking the index
//! client, classifier, selector, cache, and transitive engine per unresolved package, and
//! commits exactly one [`ResolvedPackage`] per canonical name under greedy-commit semantics.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use indexmap::IndexMap;

use crate::cache::{Cache, CacheError};
use crate::classifier::classify_all;
use crate::config::ResolverConfig;
use crate::env::HostEnvironment;
use crate::error::{ConfigError, CycleError, ResolutionError, ResolveError};
use crate::http::Http;
use crate::index_client::list_project;
use crate::metadata::requires_dist;
use crate::selector::select;
use crate::transitive::expand;
use crate::types::{Artifact, NormalizedPackageName, PackageName, Requirement, Version};

/// One committed package in the resolved map: a canonical name, the version chosen for it, the
/// marker string that introduced it (empty for direct requirements or markerless transitives),
/// and the single artifact committed to under the MVP's "exactly one chosen Artifact" invariant
/// (§3).
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// The canonical (PEP 503 normalized) package name.
    pub name: NormalizedPackageName,
    /// The version committed for this package.
    pub version: Version,
    /// The marker expression that introduced this requirement, rendered back to a string, or
    /// empty if it was a direct requirement or carried no marker.
    pub marker: String,
    /// The single artifact chosen and downloaded for this package.
    pub artifact: Artifact,
}

/// Drives a full resolve pass. Holds the environment snapshot, HTTP transport, and artifact
/// cache used across every requirement processed during [`Resolver::run`].
pub struct Resolver {
    config: ResolverConfig,
    env: HostEnvironment,
    http: Http,
    cache: Cache,
}

impl Resolver {
    /// Validates `config`, builds the HTTP transport and opens the cache directory. Fails
    /// eagerly with [`ConfigError`] before any network I/O, per §7's "fatal before any I/O"
    /// rule.
    pub fn new(config: ResolverConfig, env: HostEnvironment) -> Result<Self, ResolveError> {
        config.validate()?;

        let http = Http::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_seconds),
            config.retries,
        )
        .map_err(ConfigError::HttpClient)?;

        let cache = Cache::new(config.cache_dir())
            .map_err(|e| ConfigError::CacheDirNotCreatable(config.cache_dir().display().to_string(), e))?;

        Ok(Resolver { config, env, http, cache })
    }

    /// The environment snapshot this resolver was constructed with.
    pub fn env(&self) -> &HostEnvironment {
        &self.env
    }

    /// The configuration this resolver was constructed with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Runs the resolve pass to completion: seeds the queue from `config.requirements`, then
    /// drains it FIFO, committing one [`ResolvedPackage`] per canonical name and, when
    /// `follow_transitives` is set, expanding each committed wheel's `Requires-Dist` lines into
    /// further requirements.
    ///
    /// Returns the resolved map, keyed by canonical name, in commit order (the caller is
    /// responsible for sorting by name at emission time, per §5's "packages sorted
    /// lexicographically ... at write time").
    pub async fn run(&self) -> Result<IndexMap<NormalizedPackageName, ResolvedPackage>, ResolveError> {
        let mut queue: VecDeque<Requirement> = VecDeque::new();
        let mut seen: HashSet<NormalizedPackageName> = HashSet::new();
        let mut resolved: IndexMap<NormalizedPackageName, ResolvedPackage> = IndexMap::new();

        for req_str in &self.config.requirements {
            let req = Requirement::parse(req_str)
                .map_err(|e| ConfigError::InvalidRequirement(req_str.clone(), e.to_string()))?;
            enqueue(&mut queue, &mut seen, &resolved, req);
        }

        while let Some(req) = queue.pop_front() {
            let canon: NormalizedPackageName = req.name.clone().into();

            // Greedy commit: the first resolution for a name wins. A later requirement for an
            // already-resolved name (e.g. two direct requirements for the same package, or a
            // diamond dependency reached by two different parents) is a no-op, not a re-visit.
            if resolved.contains_key(&canon) {
                tracing::debug!(requirement = %req, "already resolved, skipping (greedy commit)");
                continue;
            }

            tracing::info!(requirement = %req, state = "listing", "resolving requirement");
            let mut candidates = Vec::new();
            for index in self.config.indexes() {
                let records = list_project(&self.http, index, &canon).await;
                candidates.extend(classify_all(&records, &canon, &self.env));
            }

            tracing::info!(requirement = %req, state = "classified", candidates = candidates.len());
            let chosen = select(&req, &candidates, &self.env).cloned().ok_or_else(|| {
                ResolutionError::NoCandidate { requirement: req.to_string() }
            })?;

            tracing::info!(requirement = %req, state = "selected", artifact = %chosen.filename());
            let mut artifact = chosen;

            tracing::info!(requirement = %req, state = "downloading", artifact = %artifact.filename());
            let digest = self
                .cache
                .ensure_cached(&self.http, &artifact, self.config.strict_hash)
                .await
                .map_err(cache_error_to_resolve_error)?;
            artifact.set_digest(digest);

            let marker = req.marker.as_ref().map(|m| m.to_string()).unwrap_or_default();
            let package = ResolvedPackage {
                name: canon.clone(),
                version: artifact.version(),
                marker,
                artifact: artifact.clone(),
            };

            commit(&mut resolved, &mut seen, canon.clone(), package)?;
            tracing::info!(requirement = %req, state = "committed", version = %artifact.version());

            if self.config.follow_transitives && artifact.is_wheel() {
                tracing::info!(requirement = %req, state = "expanding");
                let requires = self.read_requires_dist(&canon, &artifact);
                for new_req in expand(&requires, &self.env) {
                    enqueue(&mut queue, &mut seen, &resolved, new_req);
                }
            }
        }

        Ok(resolved)
    }

    /// Reads `Requires-Dist` lines out of a downloaded wheel. A corrupt archive or a missing
    /// `.dist-info` directory is a [`crate::metadata::MetadataError`], which §4.6/§7 treat as
    /// absorbed: the package itself is still committed, it simply contributes no transitives.
    fn read_requires_dist(&self, canon: &NormalizedPackageName, artifact: &Artifact) -> Vec<String> {
        let bytes = match self.cache.read(&artifact.filename()) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(filename = %artifact.filename(), error = %err, "could not re-read cached wheel for metadata");
                return Vec::new();
            }
        };

        let name: PackageName = canon.clone().into();
        match requires_dist(&bytes, &name, &artifact.version()) {
            Ok(lines) => lines,
            Err(err) => {
                tracing::warn!(filename = %artifact.filename(), error = %err, "could not extract Requires-Dist metadata");
                Vec::new()
            }
        }
    }
}

/// Appends `req` to the queue unless its canonical name is already resolved or already
/// pending (§4.6: "a name already in the resolved map or already seen is dropped on
/// re-enqueue"). This is the normal path for duplicate direct requirements and diamond
/// dependencies; it is not an error.
fn enqueue(
    queue: &mut VecDeque<Requirement>,
    seen: &mut HashSet<NormalizedPackageName>,
    resolved: &IndexMap<NormalizedPackageName, ResolvedPackage>,
    req: Requirement,
) {
    let canon: NormalizedPackageName = req.name.clone().into();
    if resolved.contains_key(&canon) {
        return;
    }
    if !seen.insert(canon) {
        return;
    }
    queue.push_back(req);
}

/// Commits `package` into the resolved map. `canon` must already be in `seen` (every queued
/// requirement is marked seen at enqueue time); if it is not, that is an internal invariant
/// break rather than a reachable user-facing state — see [`CycleError`] and the state machine
/// in §4.7. [`Resolver::run`] can never actually trigger this branch, since it only commits
/// requirements it just dequeued, which [`enqueue`] always marks seen first.
fn commit(
    resolved: &mut IndexMap<NormalizedPackageName, ResolvedPackage>,
    seen: &mut HashSet<NormalizedPackageName>,
    canon: NormalizedPackageName,
    package: ResolvedPackage,
) -> Result<(), CycleError> {
    if !seen.contains(&canon) {
        return Err(CycleError(canon.to_string()));
    }
    // First resolution wins; a second commit attempt for the same name is a no-op (§3
    // lifecycle: "attempting to insert again for the same name is a no-op").
    resolved.entry(canon).or_insert(package);
    Ok(())
}

fn cache_error_to_resolve_error(err: CacheError) -> ResolveError {
    match err {
        CacheError::Network(e) => ResolveError::Network(e),
        CacheError::Integrity(e) => ResolveError::Integrity(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn test_enqueue_dedups_on_seen() {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        let resolved = IndexMap::new();
        enqueue(&mut queue, &mut seen, &resolved, req("foo"));
        enqueue(&mut queue, &mut seen, &resolved, req("foo>=1.0"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_drops_already_resolved_name() {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        let mut resolved = IndexMap::new();
        let canon: NormalizedPackageName = "foo".parse().unwrap();
        resolved.insert(
            canon.clone(),
            ResolvedPackage {
                name: canon,
                version: "1.0".parse().unwrap(),
                marker: String::new(),
                artifact: crate::types::Artifact {
                    name: crate::types::ArtifactName::SDist(crate::types::SDistFilename {
                        distribution: "foo".parse().unwrap(),
                        version: "1.0".parse().unwrap(),
                        format: crate::types::SDistFormat::TarGz,
                    }),
                    url: "https://example.com/foo-1.0.tar.gz".parse().unwrap(),
                    sha256: String::new(),
                    matched_tag: None,
                },
            },
        );
        enqueue(&mut queue, &mut seen, &resolved, req("foo<2.0"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_commit_rejects_name_never_seen() {
        let mut resolved = IndexMap::new();
        let mut seen = HashSet::new();
        let canon: NormalizedPackageName = "foo".parse().unwrap();
        let package = ResolvedPackage {
            name: canon.clone(),
            version: "1.0".parse().unwrap(),
            marker: String::new(),
            artifact: crate::types::Artifact {
                name: crate::types::ArtifactName::SDist(crate::types::SDistFilename {
                    distribution: "foo".parse().unwrap(),
                    version: "1.0".parse().unwrap(),
                    format: crate::types::SDistFormat::TarGz,
                }),
                url: "https://example.com/foo-1.0.tar.gz".parse().unwrap(),
                sha256: String::new(),
                matched_tag: None,
            },
        };
        let err = commit(&mut resolved, &mut seen, canon, package).unwrap_err();
        assert_eq!(err.0, "foo");
    }

    #[test]
    fn test_commit_is_noop_on_second_attempt() {
        let mut resolved = IndexMap::new();
        let mut seen = HashSet::new();
        let canon: NormalizedPackageName = "foo".parse().unwrap();
        seen.insert(canon.clone());
        let make_package = |version: &str| ResolvedPackage {
            name: canon.clone(),
            version: version.parse().unwrap(),
            marker: String::new(),
            artifact: crate::types::Artifact {
                name: crate::types::ArtifactName::SDist(crate::types::SDistFilename {
                    distribution: "foo".parse().unwrap(),
                    version: version.parse().unwrap(),
                    format: crate::types::SDistFormat::TarGz,
                }),
                url: "https://example.com/foo.tar.gz".parse().unwrap(),
                sha256: String::new(),
                matched_tag: None,
            },
        };
        commit(&mut resolved, &mut seen, canon.clone(), make_package("1.0")).unwrap();
        commit(&mut resolved, &mut seen, canon.clone(), make_package("2.0")).unwrap();
        assert_eq!(resolved.get(&canon).unwrap().version, "1.0".parse().unwrap());
    }
}
