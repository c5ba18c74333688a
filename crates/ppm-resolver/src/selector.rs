//! Chooses a single [`Artifact`] to commit to for a [`Requirement`], among every artifact
//! classified for that project across every configured index.

use crate::env::HostEnvironment;
use crate::types::{Artifact, Requirement, Version};

/// Selects the best artifact for `requirement` among `candidates`.
///
/// 1. **Specifier filter** — retains artifacts whose version satisfies `requirement`'s
///    specifier set (or all of them, if the specifier is empty). Prerelease inclusion follows
///    PEP 440: a prerelease is retained if the specifier explicitly names a prerelease bound
///    (e.g. `>=1.0rc1`) OR if no stable version survives the filter at all — independent of one
///    another, so an explicit prerelease bound keeps prereleases in play even when a satisfying
///    stable version also exists.
/// 2. **Version choice** — the greatest surviving version is chosen; PEP 440 versions compare
///    totally, so ties are impossible.
/// 3. **Artifact choice** — among artifacts at the chosen version, the best-ranked wheel is
///    preferred; if no wheel in the set ranked under the current environment, any sdist is
///    chosen (sorted by filename for determinism).
///
/// Returns `None` if no candidate survives the specifier filter, or if the chosen version has
/// no selectable artifact at all.
pub fn select<'a>(
    requirement: &Requirement,
    candidates: &'a [Artifact],
    env: &HostEnvironment,
) -> Option<&'a Artifact> {
    let allows_prerelease = requirement
        .specifiers
        .iter()
        .any(|s| s.version().any_prerelease());

    let stable_matches: Vec<&Artifact> = candidates
        .iter()
        .filter(|a| requirement.matches_version(&a.version()) && !a.version().is_prerelease())
        .collect();

    let matches: Vec<&Artifact> = if allows_prerelease || stable_matches.is_empty() {
        candidates
            .iter()
            .filter(|a| requirement.matches_version(&a.version()))
            .collect()
    } else {
        stable_matches
    };

    let best_version: Version = matches.iter().map(|a| a.version()).max()?;

    let at_version: Vec<&Artifact> = matches
        .into_iter()
        .filter(|a| a.version() == best_version)
        .collect();

    let best_wheel = at_version
        .iter()
        .filter(|a| a.is_wheel())
        .filter_map(|a| {
            a.matched_tag
                .as_ref()
                .and_then(|tag| env.tags().compatibility(tag))
                .map(|score| (*a, score))
        })
        .max_by_key(|(_, score)| *score)
        .map(|(a, _)| a);

    if let Some(wheel) = best_wheel {
        return Some(wheel);
    }

    at_version
        .into_iter()
        .filter(|a| !a.is_wheel())
        .min_by_key(|a| a.filename())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::env::DEFAULT_CPYTHON_MINOR;
    use crate::index_client::IndexRecord;
    use crate::classifier::classify;

    fn artifact(env: &HostEnvironment, filename: &str) -> Artifact {
        let name = "trio".parse().unwrap();
        let record = IndexRecord {
            url: format!("https://pypi.org/simple/trio/{filename}").parse().unwrap(),
            filename: filename.to_string(),
            sha256_hint: String::new(),
        };
        classify(&record, &name, env).unwrap()
    }

    #[test]
    fn test_selects_greatest_version() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let candidates = vec![
            artifact(&env, "trio-0.17.0-py3-none-any.whl"),
            artifact(&env, "trio-0.18.0-py3-none-any.whl"),
        ];
        let req = Requirement::parse("trio").unwrap();
        let chosen = select(&req, &candidates, &env).unwrap();
        assert_eq!(chosen.version(), "0.18.0".parse().unwrap());
    }

    #[test]
    fn test_prefers_wheel_over_sdist() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let candidates = vec![
            artifact(&env, "trio-0.18.0.tar.gz"),
            artifact(&env, "trio-0.18.0-py3-none-any.whl"),
        ];
        let req = Requirement::parse("trio").unwrap();
        let chosen = select(&req, &candidates, &env).unwrap();
        assert!(chosen.is_wheel());
    }

    #[test]
    fn test_falls_back_to_sdist_when_no_wheel_matches() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let candidates = vec![
            artifact(&env, "trio-0.18.0-cp27-cp27m-win32.whl"),
            artifact(&env, "trio-0.18.0.tar.gz"),
        ];
        let req = Requirement::parse("trio").unwrap();
        let chosen = select(&req, &candidates, &env).unwrap();
        assert!(!chosen.is_wheel());
    }

    #[test]
    fn test_specifier_filters_out_nonmatching_versions() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let candidates = vec![
            artifact(&env, "trio-0.17.0-py3-none-any.whl"),
            artifact(&env, "trio-0.18.0-py3-none-any.whl"),
        ];
        let req = Requirement::parse("trio<0.18.0").unwrap();
        let chosen = select(&req, &candidates, &env).unwrap();
        assert_eq!(chosen.version(), "0.17.0".parse().unwrap());
    }

    #[test]
    fn test_no_candidate_returns_none() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let req = Requirement::parse("trio>=99.0").unwrap();
        let candidates = vec![artifact(&env, "trio-0.18.0-py3-none-any.whl")];
        assert!(select(&req, &candidates, &env).is_none());
    }

    #[test]
    fn test_explicit_prerelease_bound_wins_over_satisfying_stable_version() {
        let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
        let candidates = vec![
            artifact(&env, "trio-1.0rc1-py3-none-any.whl"),
            artifact(&env, "trio-0.9.0-py3-none-any.whl"),
        ];
        // Both 0.9.0 and 1.0rc1 satisfy this specifier, but naming a prerelease bound
        // explicitly should still prefer the prerelease over the satisfying stable version.
        let req = Requirement::parse("trio>=1.0rc1,<2.0").unwrap();
        let chosen = select(&req, &candidates, &env).unwrap();
        assert_eq!(chosen.version(), "1.0rc1".parse().unwrap());
    }
}
